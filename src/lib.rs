pub mod chan;
pub mod conn;
pub mod exec;
pub mod seg;
pub mod trace;

#[cfg(test)]
mod test;
