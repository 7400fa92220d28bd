// Domain-layer modules and shared errors/models
pub mod leads {
    pub use crate::leads::*;
}

pub mod content {
    pub use crate::content::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod dedupe {
    pub use crate::dedupe::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
