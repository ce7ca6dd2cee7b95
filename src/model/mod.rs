pub mod field;
pub mod locale;
pub mod record;
