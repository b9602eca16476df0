//! Deferred computation graph.
//!
//! A [`Node`] wraps a one-shot thunk together with the nodes it reads from
//! (captured inside the thunk). Evaluation forces inputs depth-first and
//! memoizes the result, so a node shared by several consumers runs once.
//! Nodes are built from already-existing nodes only, which keeps the graph
//! acyclic.
//!
//! [`Values`] lets numeric code accept realized arrays and pending nodes
//! through one type: operations on eager inputs stay eager, anything touching
//! a lazy input produces a new node.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, TmleError};

/// Realized per-observation values.
pub type Array = Rc<[f64]>;

type Thunk = Box<dyn FnOnce() -> Result<Array>>;

/// A memoized node in the computation graph.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

struct NodeInner {
    label: String,
    thunk: RefCell<Option<Thunk>>,
    memo: OnceCell<Result<Array>>,
}

impl Node {
    pub fn new<F>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Result<Array> + 'static,
    {
        Self(Rc::new(NodeInner {
            label: label.into(),
            thunk: RefCell::new(Some(Box::new(f))),
            memo: OnceCell::new(),
        }))
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    pub fn is_evaluated(&self) -> bool {
        self.0.memo.get().is_some()
    }

    /// Force the node, running its thunk on first use.
    pub fn evaluate(&self) -> Result<Array> {
        self.0
            .memo
            .get_or_init(|| {
                let thunk = self.0.thunk.borrow_mut().take();
                match thunk {
                    Some(f) => f(),
                    None => Err(TmleError::numerical(format!(
                        "graph node '{}' has no thunk to evaluate",
                        self.0.label
                    ))),
                }
            })
            .clone()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("label", &self.0.label)
            .field("evaluated", &self.is_evaluated())
            .finish()
    }
}

/// Per-observation values, either realized or pending.
#[derive(Debug, Clone)]
pub enum Values {
    Eager(Array),
    Lazy(Node),
}

impl Values {
    pub fn lazy<F>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Result<Array> + 'static,
    {
        Self::Lazy(Node::new(label, f))
    }

    pub const fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    pub fn realize(&self) -> Result<Array> {
        match self {
            Self::Eager(a) => Ok(Rc::clone(a)),
            Self::Lazy(node) => node.evaluate(),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<f64>> {
        Ok(self.realize()?.to_vec())
    }

    /// Apply `f` elementwise.
    pub fn map<F>(&self, label: &str, f: F) -> Self
    where
        F: Fn(f64) -> f64 + 'static,
    {
        match self {
            Self::Eager(a) => Self::Eager(a.iter().map(|&x| f(x)).collect()),
            Self::Lazy(_) => {
                let input = self.clone();
                Self::lazy(label, move || {
                    Ok(input.realize()?.iter().map(|&x| f(x)).collect())
                })
            }
        }
    }

    /// Combine two equally long inputs pairwise with a fallible `f`.
    ///
    /// Length and element errors surface immediately for eager inputs and at
    /// evaluation time otherwise.
    pub fn try_zip_with<F>(&self, other: &Self, label: &str, f: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> Result<f64> + 'static,
    {
        match (self, other) {
            (Self::Eager(a), Self::Eager(b)) => Ok(Self::Eager(zip_arrays(a, b, &f)?)),
            _ => {
                let (lhs, rhs) = (self.clone(), other.clone());
                Ok(Self::lazy(label, move || {
                    zip_arrays(&lhs.realize()?, &rhs.realize()?, &f)
                }))
            }
        }
    }
}

impl From<Vec<f64>> for Values {
    fn from(v: Vec<f64>) -> Self {
        Self::Eager(v.into())
    }
}

impl From<&[f64]> for Values {
    fn from(v: &[f64]) -> Self {
        Self::Eager(v.into())
    }
}

impl From<Node> for Values {
    fn from(node: Node) -> Self {
        Self::Lazy(node)
    }
}

fn zip_arrays<F>(a: &[f64], b: &[f64], f: &F) -> Result<Array>
where
    F: Fn(f64, f64) -> Result<f64>,
{
    TmleError::check_len(a.len(), b.len())?;
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f(x, y))
        .collect::<Result<Vec<f64>>>()
        .map(Array::from)
}
