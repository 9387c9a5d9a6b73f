pub mod article;
pub mod record;
pub mod report;

pub use article::*;
pub use record::*;
pub use report::*;
