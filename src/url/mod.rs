//! URL handling: normalization, admission policy, and filename mapping

mod normalize;
mod policy;

pub use normalize::{host_of, normalize_url};
pub use policy::{evaluate, file_name_for, PolicyVerdict};
