pub mod blowfish;
