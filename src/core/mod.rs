pub mod datastream;
