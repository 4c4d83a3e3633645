pub mod campaigns;
pub mod conversations;
pub mod webhooks;
