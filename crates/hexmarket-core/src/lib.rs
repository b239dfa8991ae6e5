//! Hexmarket - a hex-board trading game engine
//!
//! This crate provides the rules engine for Hexmarket matches, including:
//! - Hex coordinates and the vertex/edge adjacency graph
//! - Board generation (standard map, custom boards, draft islands) with harbors
//! - Player state, resources and development cards
//! - The game state machine: lobby, draft, setup, turns and scoring
//! - Team mode: tile auction and spells
//!
//! # Architecture
//!
//! A match is one [`GameState`] value. Every action is a [`Command`] applied
//! through [`GameState::apply`], which either accepts it and returns the
//! resulting [`GameEvent`]s or rejects it with a [`GameError`] and leaves the
//! state untouched. The engine does no locking and no I/O; the transport owns
//! the state and feeds it one command at a time.
//!
//! # Modules
//!
//! - [`hex`]: Axial coordinates and pixel layout
//! - [`graph`]: Hex/vertex/edge arena with adjacency maps
//! - [`board`]: Tiles, numbers, harbors and the robber
//! - [`player`]: Player state and resources
//! - [`game`]: Game state machine and command dispatch
//! - [`build`], [`production`], [`dev_cards`], [`trade`]: turn rules
//! - [`stats`]: Longest road, largest army, victory points
//! - [`draft`], [`spells`]: Team mode
//! - [`snapshot`]: Per-viewer state projection

pub mod actions;
pub mod board;
pub mod build;
pub mod dev_cards;
pub mod draft;
pub mod game;
pub mod graph;
pub mod hex;
pub mod player;
pub mod production;
pub mod settings;
pub mod snapshot;
pub mod spells;
pub mod stats;
pub mod trade;

// Re-export commonly used types
pub use actions::{BuildKind, Command, GameEvent, TradeOffer};
pub use board::{Board, BoardError, HexSpec, HexTile, Port, PortKind, PortSpec, Resource, TileKind};
pub use draft::{DraftStage, DraftState};
pub use game::{GameError, GamePhase, GameState, Winner};
pub use graph::{BoardGraph, EdgeId, HexId, VertexId};
pub use hex::HexCoord;
pub use player::{DevCard, Player, PlayerColor, PlayerId, ResourceHand, TeamId};
pub use settings::{GameSettings, MapMode, SettingsError, SettingsUpdate};
pub use snapshot::{GameSnapshot, PlayerView};
pub use spells::{SpellCast, SpellKind};
pub use stats::longest_road;
