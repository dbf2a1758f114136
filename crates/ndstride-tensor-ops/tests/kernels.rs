use approx::assert_relative_eq;
use ndstride_tensor::{Order, Tensor};
use ndstride_tensor_ops::{op::Sum, ExecutionStrategy, TensorOps, TensorOpsError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_view(rng: &mut StdRng) -> Result<Tensor<f64>, TensorOpsError> {
    let dims = [rng.random_range(2..7), rng.random_range(2..7), rng.random_range(2..7)];
    let size: usize = dims.iter().product();
    let data: Vec<f64> = (0..size).map(|_| rng.random_range(-5.0..5.0)).collect();
    let base = Tensor::from_shape_vec(dims, data)?;
    let view = match rng.random_range(0..4) {
        0 => base,
        1 => base.permute(&[2, 0, 1])?,
        2 => base.flip(1)?,
        _ => base.narrow(0, true, 1, dims[0])?,
    };
    Ok(view)
}

#[test]
fn binary_matches_index_reference() -> Result<(), TensorOpsError> {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..30 {
        let a = random_view(&mut rng)?;
        let b = a.flip(0)?.copy(Order::F)?;
        let sum = a.add(&b)?;
        let max = a.maximum(&b)?;
        for index in a.index_iter(Order::C) {
            let (x, y) = (a.get(&index)?, b.get(&index)?);
            assert_eq!(sum.get(&index)?, x + y);
            assert_eq!(max.get(&index)?, x.max(y));
        }
    }
    Ok(())
}

#[test]
fn inplace_writes_through_the_source() -> Result<(), TensorOpsError> {
    let base = Tensor::<i32>::seq([4, 5])?;
    let mut block = base.narrow_all(true, &[1, 1], &[3, 4])?.t();
    block.mul_scalar_inplace(-1)?;
    for i in 0..4 {
        for j in 0..5 {
            let expected = (i * 5 + j) as i32;
            let inside = (1..3).contains(&i) && (1..4).contains(&j);
            assert_eq!(base.get(&[i, j])?, if inside { -expected } else { expected });
        }
    }
    Ok(())
}

#[test]
fn axis_reductions_match_reference() -> Result<(), TensorOpsError> {
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..20 {
        let t = random_view(&mut rng)?;
        for axis in 0..3 {
            let sums = t.sum_axis(axis, true)?;
            let means = t.mean_axis(axis, false)?;
            let dim = t.dim(axis)?;
            for index in sums.index_iter(Order::C) {
                let mut probe = index.clone();
                let mut expected = 0.0;
                for k in 0..dim {
                    probe[axis] = k;
                    expected += t.get(&probe)?;
                }
                assert_relative_eq!(sums.get(&index)?, expected, epsilon = 1e-9);
                let mut reduced = index.clone();
                reduced.remove(axis);
                assert_relative_eq!(means.get(&reduced)?, expected / dim as f64, epsilon = 1e-9);
            }
        }
        assert_relative_eq!(t.sum()?, t.to_f64_vec(Order::C).iter().sum::<f64>(), epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn parallel_matches_serial_above_threshold() -> Result<(), TensorOpsError> {
    let t = Tensor::<i64>::seq([300, 300])?.t();
    let serial = t.reduce_axis(&Sum, 0, false, ExecutionStrategy::Serial)?;
    let auto = t.sum_axis(0, false)?;
    assert_eq!(serial.to_vec(Order::C), auto.to_vec(Order::C));
    assert_eq!(t.sum()?, (0..90_000i64).sum::<i64>());
    Ok(())
}
