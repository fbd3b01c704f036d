pub mod record;
pub mod role;
pub mod zone;
