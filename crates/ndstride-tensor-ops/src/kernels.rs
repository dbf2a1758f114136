//! Inner loops over [`StrideLoopDescriptor`] runs.
//!
//! Every function here handles one run: `bound` elements starting at an
//! outer offset. Contiguous runs (the unit path) are processed as slices in
//! lane-sized chunks so the compiler can vectorize them; any other stride,
//! including negative and zero strides, takes the scalar step path.
//!
//! # Safety
//!
//! All functions are `unsafe` for the same reason: they index storage
//! without bounds checks. Callers pass descriptors built from layouts that
//! were validated against the storages they walk, and never hand two runs
//! that overlap in a written storage to concurrent calls.

use ndstride_tensor::{Element, StrideLoopDescriptor, TensorError, TensorStorage};

use crate::op::{BinaryOp, UnaryOp};

/// Applies `op` to one run of `storage` in place.
///
/// # Safety
///
/// See the module documentation.
pub unsafe fn unary_run<T, O>(storage: &TensorStorage<T>, lp: &StrideLoopDescriptor, start: usize, op: &O)
where
    T: Element,
    O: UnaryOp<T>,
{
    if lp.is_unit() {
        let run = storage.slice_mut(start, lp.bound);
        let (head, tail) = run.split_at_mut(lp.simd_bound);
        for chunk in head.chunks_exact_mut(lp.simd_len.max(1)) {
            for x in chunk.iter_mut() {
                *x = op.apply(*x);
            }
        }
        for x in tail.iter_mut() {
            *x = op.apply(*x);
        }
    } else {
        for p in lp.inner(start) {
            storage.set_unchecked(p, op.apply(storage.get_unchecked(p)));
        }
    }
}

/// Applies `op` between one run of `dst` and the matching run of `src`,
/// writing into `dst`.
///
/// The two descriptors must come from the same
/// [`StrideLoopDescriptor::of_tandem`] call.
///
/// # Safety
///
/// See the module documentation. `dst` and `src` must not share storage.
pub unsafe fn binary_run<T, O>(
    dst: &TensorStorage<T>,
    dst_lp: &StrideLoopDescriptor,
    dst_start: usize,
    src: &TensorStorage<T>,
    src_lp: &StrideLoopDescriptor,
    src_start: usize,
    op: &O,
) -> Result<(), TensorError>
where
    T: Element,
    O: BinaryOp<T>,
{
    debug_assert_eq!(dst_lp.bound, src_lp.bound);
    match (dst_lp.is_unit(), src_lp.step) {
        (true, 0) => {
            let value = src.get_unchecked(src_start);
            op.apply_range(dst, dst_start, dst_lp.bound, value)?;
        }
        (true, 1) => {
            let lanes = dst_lp.simd_len.max(1);
            let out = dst.slice_mut(dst_start, dst_lp.bound);
            let rhs = src.slice(src_start, src_lp.bound);
            let (out_head, out_tail) = out.split_at_mut(dst_lp.simd_bound);
            let (rhs_head, rhs_tail) = rhs.split_at(dst_lp.simd_bound);
            for (o, r) in out_head.chunks_exact_mut(lanes).zip(rhs_head.chunks_exact(lanes)) {
                for (a, &b) in o.iter_mut().zip(r) {
                    *a = op.apply(*a, b);
                }
            }
            for (a, &b) in out_tail.iter_mut().zip(rhs_tail) {
                *a = op.apply(*a, b);
            }
        }
        _ => {
            for (p, q) in dst_lp.inner(dst_start).zip(src_lp.inner(src_start)) {
                dst.set_unchecked(p, op.apply(dst.get_unchecked(p), src.get_unchecked(q)));
            }
        }
    }
    Ok(())
}

/// Folds the `bound` elements starting at `start` spaced `step` apart.
///
/// # Safety
///
/// See the module documentation.
pub unsafe fn fold_run<T, A, F>(
    storage: &TensorStorage<T>,
    start: usize,
    bound: usize,
    step: isize,
    init: A,
    mut f: F,
) -> A
where
    T: Element,
    F: FnMut(A, T) -> A,
{
    if step == 1 {
        return storage.slice(start, bound).iter().fold(init, |acc, &x| f(acc, x));
    }
    let mut acc = init;
    let mut p = start as isize;
    for _ in 0..bound {
        acc = f(acc, storage.get_unchecked(p as usize));
        p += step;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{Add, Mul, Neg};
    use ndstride_tensor::{Order, StrideLayout};

    #[test]
    fn test_unary_unit_and_step() -> Result<(), TensorError> {
        let storage = TensorStorage::from_vec((0..12).collect::<Vec<i32>>())?;
        let layout = StrideLayout::of_dense([4, 3], 0, Order::C);
        let lp = StrideLoopDescriptor::of(&layout, Order::C, 8);
        for &start in &lp.offsets {
            unsafe { unary_run(&storage, &lp, start, &Neg) };
        }
        assert_eq!(storage.get(11), Some(-11));

        let column = layout.narrow(1, false, 1, 2)?;
        let lp = StrideLoopDescriptor::of(&column, Order::C, 8);
        assert!(!lp.is_unit());
        for &start in &lp.offsets {
            unsafe { unary_run(&storage, &lp, start, &Neg) };
        }
        assert_eq!(storage.to_vec()[..6], [0, 1, -2, -3, 4, -5]);
        Ok(())
    }

    #[test]
    fn test_binary_broadcast_row() -> Result<(), TensorError> {
        let dst = TensorStorage::from_vec(vec![1.0f64; 6])?;
        let src = TensorStorage::from_vec(vec![10.0f64, 20.0])?;
        let dst_layout = StrideLayout::of_dense([2, 3], 0, Order::C);
        // column vector [10, 20] broadcast over 3 columns
        let src_layout = StrideLayout::of_dense([2, 1], 0, Order::C).expand(1, 3)?;
        let lps = StrideLoopDescriptor::of_tandem(&[&dst_layout, &src_layout], Order::C, 4)?;
        for (&d, &s) in lps[0].offsets.iter().zip(&lps[1].offsets) {
            unsafe { binary_run(&dst, &lps[0], d, &src, &lps[1], s, &Add)? };
        }
        assert_eq!(dst.to_vec(), vec![11.0, 11.0, 11.0, 21.0, 21.0, 21.0]);

        let lanes = StrideLoopDescriptor::of_tandem(&[&dst_layout, &dst_layout], Order::C, 4)?;
        let other = TensorStorage::from_vec(vec![2.0f64; 6])?;
        unsafe { binary_run(&dst, &lanes[0], 0, &other, &lanes[1], 0, &Mul)? };
        assert_eq!(dst.to_vec()[5], 42.0);
        Ok(())
    }

    #[test]
    fn test_fold_negative_step() -> Result<(), TensorError> {
        let storage = TensorStorage::from_vec(vec![1i64, 2, 3, 4])?;
        let seen = unsafe { fold_run(&storage, 3, 4, -1, Vec::new(), |mut acc, x| {
            acc.push(x);
            acc
        }) };
        assert_eq!(seen, vec![4, 3, 2, 1]);
        let sum = unsafe { fold_run(&storage, 0, 4, 1, 0, |acc, x| acc + x) };
        assert_eq!(sum, 10);
        Ok(())
    }
}
