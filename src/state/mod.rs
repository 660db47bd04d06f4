pub mod collection;
pub mod key_value;
pub mod request_state;
pub mod response_state;
pub mod run_record;
pub mod session;
pub mod tab;
