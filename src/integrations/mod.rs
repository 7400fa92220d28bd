//! Storage backends and outbound email.

pub mod store {
    pub use crate::store::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}

pub mod mailer {
    pub use crate::mailer::*;
}

pub mod notifications {
    pub use crate::notifications::*;
}
