pub mod shapes;

pub use shapes::{NodeShape, PropertyConstraint, RangeKind};

/// The constraint model: every node shape of a shapes graph, in document order.
///
/// Built once by [`ShapeModel::from_turtle`] or [`ShapeModel::from_file`] and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeModel {
    shapes: Vec<NodeShape>,
}

impl ShapeModel {
    pub fn new(shapes: Vec<NodeShape>) -> Self {
        ShapeModel { shapes }
    }

    pub fn shapes(&self) -> &[NodeShape] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterates `(shape, constraint)` pairs in model order.
    pub fn constraints(&self) -> impl Iterator<Item = (&NodeShape, &PropertyConstraint)> {
        self.shapes
            .iter()
            .flat_map(|shape| shape.properties().iter().map(move |c| (shape, c)))
    }
}
