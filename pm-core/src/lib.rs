#![warn(missing_docs)]
//! Core models and ports for hierarchical demand-response matching.
//!
//! Leaf agents express their demand for a commodity as a function of price
//! ([`models::BidInfo`]). Concentrators sum the bids of their children and an
//! auctioneer clears the aggregate into a single [`models::PriceInfo`], which
//! is then relayed back down the tree. Everything is expressed relative to a
//! [`models::MarketBasis`].

/// Core domain models for the matcher.
///
/// This module contains the value objects shared by every node of a matching
/// tree: the market basis that defines the price coordinate space, the bids
/// expressed against it, and the prices cleared from those bids.
///
/// The models are immutable once constructed. A node never edits a bid or a
/// price it has received; it replaces it wholesale with the next one.
pub mod models;

/// Interface traits for the matcher.
///
/// These are the "ports" through which nodes of a matching tree talk to one
/// another. A parent implements [`ports::MatcherService`] so that children
/// can submit bids, and a child implements [`ports::AgentService`] so that
/// its parent can push prices. Keeping these as traits lets transport
/// adapters stand in for a remote peer without the engine knowing.
pub mod ports;
