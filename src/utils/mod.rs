pub mod dates;
pub mod db_utils;
pub mod email_cache;
pub mod email_filter;
pub mod email_index;
pub mod pagination;
pub mod pdf;
pub mod seed;
pub mod validation;
