//! SNMP access control. v1/v2c authenticate by community string only.

mod community;

pub use community::Community;
