//! Services module for business logic and integrations

pub mod application;
pub mod document_upload;
pub mod eligibility;
pub mod notification;
pub mod payment_capture;
pub mod payment_order;
pub mod submission;
pub mod webhook_processor;

pub use application::ApplicationService;
pub use document_upload::DocumentUploadService;
pub use notification::{EmailSender, NotificationDispatcher};
pub use payment_capture::PaymentCaptureService;
pub use payment_order::PaymentOrderService;
pub use submission::SubmissionService;
pub use webhook_processor::WebhookProcessor;
