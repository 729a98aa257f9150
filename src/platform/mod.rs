pub mod opener;
pub mod restart;
