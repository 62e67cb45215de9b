pub mod battle;
pub mod checksum;
pub mod variant;
