//! Bounded, human-readable rendering of tensor contents.

use crate::{Element, Tensor};

/// Limits used when rendering a tensor as text.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayOptions {
    /// Largest number of rows (every axis but the last) shown in full.
    pub max_rows: usize,
    /// Largest number of columns (the last axis) shown in full.
    pub max_cols: usize,
    /// Digits after the decimal point for float dtypes, shortest form if unset.
    pub precision: Option<usize>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            max_rows: 41,
            max_cols: 21,
            precision: None,
        }
    }
}

impl DisplayOptions {
    /// Options that never truncate.
    pub fn full() -> Self {
        Self {
            max_rows: usize::MAX,
            max_cols: usize::MAX,
            ..Self::default()
        }
    }
}

/// Positions to show along an axis of length `dim`; `None` marks the gap.
fn visible(dim: usize, limit: usize) -> Vec<Option<usize>> {
    if dim <= limit || limit < 3 {
        return (0..dim).map(Some).collect();
    }
    let head = limit / 2;
    let tail = limit - head - 1;
    (0..head)
        .map(Some)
        .chain(std::iter::once(None))
        .chain((dim - tail..dim).map(Some))
        .collect()
}

struct Renderer<'a> {
    options: &'a DisplayOptions,
}

impl Renderer<'_> {
    fn value<T: Element>(&self, value: T) -> String {
        match self.options.precision {
            Some(precision) if T::DTYPE.is_floating_point() => {
                format!("{:.*}", precision, value.to_f64())
            }
            _ => format!("{value}"),
        }
    }

    fn limit(&self, rank: usize) -> usize {
        if rank == 1 {
            self.options.max_cols
        } else {
            self.options.max_rows
        }
    }

    /// Walks the visible elements of `tensor` at multi-index `prefix`.
    fn visit<T: Element>(&self, tensor: &Tensor<T>, prefix: &mut Vec<usize>, f: &mut impl FnMut(T)) {
        let axis = prefix.len();
        if axis == tensor.rank() {
            if let Ok(value) = tensor.get(prefix) {
                f(value);
            }
            return;
        }
        let dim = tensor.shape().dims()[axis];
        for i in visible(dim, self.limit(tensor.rank() - axis)).into_iter().flatten() {
            prefix.push(i);
            self.visit(tensor, prefix, f);
            prefix.pop();
        }
    }

    fn render<T: Element>(&self, tensor: &Tensor<T>, prefix: &mut Vec<usize>, width: usize, out: &mut String) {
        let axis = prefix.len();
        if axis == tensor.rank() {
            if let Ok(value) = tensor.get(prefix) {
                out.push_str(&format!("{:>width$}", self.value(value)));
            }
            return;
        }
        let remaining = tensor.rank() - axis;
        let dim = tensor.shape().dims()[axis];
        let separator = match remaining {
            1 => " ".to_string(),
            2 => format!("\n{}", " ".repeat(axis + 1)),
            _ => format!("\n\n{}", " ".repeat(axis + 1)),
        };
        out.push('[');
        for (k, position) in visible(dim, self.limit(remaining)).into_iter().enumerate() {
            if k > 0 {
                out.push_str(&separator);
            }
            match position {
                Some(i) => {
                    prefix.push(i);
                    self.render(tensor, prefix, width, out);
                    prefix.pop();
                }
                None => out.push_str("..."),
            }
        }
        out.push(']');
    }
}

impl<T: Element> Tensor<T> {
    /// Renders the elements as nested brackets, eliding the middle of any
    /// axis longer than the configured limits.
    pub fn to_content(&self, options: &DisplayOptions) -> String {
        let renderer = Renderer { options };
        let mut width = 0;
        renderer.visit(self, &mut Vec::new(), &mut |v| {
            width = width.max(renderer.value(v).len());
        });
        let mut out = String::new();
        renderer.render(self, &mut Vec::new(), width, &mut out);
        out
    }

    /// Renders every element without truncation.
    pub fn to_full_content(&self) -> String {
        self.to_content(&DisplayOptions::full())
    }
}

impl<T: Element> std::fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Tensor<{}> shape {} strides {:?} offset {}",
            T::DTYPE,
            self.shape(),
            self.strides(),
            self.offset()
        )?;
        f.write_str(&self.to_content(&DisplayOptions::default()))
    }
}
