pub mod hubtel;
pub mod paystack;
pub mod processor;
pub mod shortcode;
