pub mod bdrate;
pub mod info;
pub mod plot;
pub mod sim;
