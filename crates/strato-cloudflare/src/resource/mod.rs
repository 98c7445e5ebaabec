//! Per-resource reconcilers
//!
//! One module per remote resource type. Every module follows the same shape:
//! a typed state struct (declared attributes plus server-computed fields), a
//! small API trait implemented by [`crate::Client`], and a reconciler with
//! the five lifecycle operations.

pub mod access_keys;
pub mod account_member;
pub mod byo_ip_prefix;
pub mod certificate_pack;
pub mod custom_pages;
pub mod fallback_origin;
pub mod filter;
pub mod load_balancer_pool;
pub mod magic_firewall_ruleset;
pub mod origin_pulls_certificate;
pub mod teams_list;
pub mod waf_override;
pub mod worker_cron_trigger;
