//! ERP Copilot - conversational front-end over an ERP dataset.
//!
//! A request is classified into a business domain (sales, finance,
//! inventory, analytics), turned into a structured intent, resolved against
//! the relational store or the document retriever, and answered in plain
//! language. Every reasoning and data-store call is written to an audit
//! trail, and mutations above a configured amount wait for approval.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
