/// Traversal order over the elements of a tensor.
///
/// `C` walks the last axis fastest (row-major), `F` walks the first axis
/// fastest (column-major) and `S` walks axes by ascending absolute stride,
/// which is the order that touches storage most contiguously.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Order {
    /// Row-major order.
    #[default]
    C,
    /// Column-major order.
    F,
    /// Storage order.
    S,
}

impl Order {
    /// Maps `S` to the default dense order and keeps `C`/`F`.
    ///
    /// Used wherever a new dense buffer must be laid out and storage order
    /// has no meaning yet.
    pub fn dense(self) -> Order {
        match self {
            Order::S => Order::default(),
            other => other,
        }
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Order::C => "C",
            Order::F => "F",
            Order::S => "S",
        };
        f.write_str(name)
    }
}
