mod goals;
mod sessions;

pub use sessions::StoredSessionInfo;
