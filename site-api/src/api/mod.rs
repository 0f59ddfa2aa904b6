pub mod cms;
pub mod media;
pub mod revalidate;
pub mod stock;
pub mod utils;
