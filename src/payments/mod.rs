//! Payment processor integration: pricing, wire types, and the gateway seam

pub mod error;
pub mod gateway;
pub mod paypal;
pub mod pricing;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use gateway::PaymentGateway;
pub use paypal::PayPalGateway;
