use crate::{Element, Order, Tensor};

use serde::ser::SerializeStruct;
use serde::Deserialize;

/// Serializes the logical contents: shape plus row-major data.
///
/// Layout details such as strides and offset are not preserved; the
/// deserialized tensor is dense and owns its storage.
impl<T> serde::Serialize for Tensor<T>
where
    T: Element + serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Tensor", 3)?;
        state.serialize_field("dtype", &T::DTYPE)?;
        state.serialize_field("shape", self.shape().dims())?;
        state.serialize_field("data", &self.to_vec(Order::C))?;
        state.end()
    }
}

impl<'de, T> serde::Deserialize<'de> for Tensor<T>
where
    T: Element + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TensorData<T> {
            dtype: crate::DType,
            shape: Vec<usize>,
            data: Vec<T>,
        }

        let TensorData { dtype, shape, data } = TensorData::deserialize(deserializer)?;
        if dtype != T::DTYPE {
            return Err(serde::de::Error::custom(format!(
                "expected dtype {}, found {dtype}",
                T::DTYPE
            )));
        }
        Tensor::from_shape_vec(shape, data).map_err(serde::de::Error::custom)
    }
}
