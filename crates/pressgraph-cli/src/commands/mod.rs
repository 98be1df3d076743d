pub mod channels;
pub mod run;
