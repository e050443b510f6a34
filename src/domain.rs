pub mod dss;
