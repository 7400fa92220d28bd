// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod auth {
    pub use crate::auth::*;
}

pub mod validation {
    pub use crate::validation::*;
}
