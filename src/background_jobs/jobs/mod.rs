//! Concrete background job implementations.

mod auto_cancel;

pub use auto_cancel::AutoCancelOrdersJob;
