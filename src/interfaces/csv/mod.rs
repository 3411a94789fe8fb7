//! CSV codecs: catalog seed files in, payout statements out.

pub mod catalog_reader;
pub mod statement_writer;
