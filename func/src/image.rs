//! Input buffer parameters.
//!
//! An [`ImageParam`] stands for a caller-supplied input buffer. Reads
//! appear as `Image` calls in the IR and become flat loads (with the
//! buffer's runtime strides) during storage flattening.

use rill_ir::{CallType, Expr, Type};

#[derive(Debug, Clone)]
pub struct ImageParam {
    name: String,
    ty: Type,
    dimensions: usize,
}

impl ImageParam {
    pub fn new(name: impl Into<String>, ty: Type, dimensions: usize) -> Self {
        Self { name: name.into(), ty, dimensions }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Read the buffer at the given coordinates.
    ///
    /// # Panics
    ///
    /// Panics when the coordinate count does not match the declared
    /// dimensionality; that is a frontend programming error.
    pub fn at(&self, args: impl IntoIterator<Item = Expr>) -> Expr {
        let args: Vec<Expr> = args.into_iter().collect();
        assert_eq!(
            args.len(),
            self.dimensions,
            "input {} is {}-dimensional, indexed with {} coordinates",
            self.name,
            self.dimensions,
            args.len()
        );
        Expr::call(self.ty, self.name.clone(), args, CallType::Image)
    }
}
