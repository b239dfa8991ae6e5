//! Match rules configured in the lobby.

use crate::player::TeamId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which map a match is played on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapMode {
    /// Randomized 19-hex board
    #[default]
    Standard,
    /// Team draft: islands assembled from auctioned tiles
    Draft,
}

/// Rules for one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Points (per player, or per team in team mode) that end the game
    pub win_points: u32,
    /// A 7 makes players holding more than this many cards discard
    pub discard_limit: u32,
    pub team_mode: bool,
    pub map_mode: MapMode,
    /// Team picking first in the spell draft
    pub spell_draft_first_team: TeamId,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            win_points: 10,
            discard_limit: 7,
            team_mode: false,
            map_mode: MapMode::Standard,
            spell_draft_first_team: 0,
        }
    }
}

/// Partial settings change; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub win_points: Option<u32>,
    #[serde(default)]
    pub discard_limit: Option<u32>,
    #[serde(default)]
    pub team_mode: Option<bool>,
    #[serde(default)]
    pub map_mode: Option<MapMode>,
    #[serde(default)]
    pub spell_draft_first_team: Option<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SettingsError {
    #[error("win points must be between {min} and {max}")]
    WinPointsOutOfRange { min: u32, max: u32 },

    #[error("discard limit must be between {min} and {max}")]
    DiscardLimitOutOfRange { min: u32, max: u32 },

    #[error("draft map requires team mode")]
    DraftNeedsTeams,

    #[error("team {0} does not exist")]
    UnknownTeam(TeamId),
}

impl GameSettings {
    pub const WIN_POINTS_RANGE: (u32, u32) = (3, 30);
    pub const DISCARD_LIMIT_RANGE: (u32, u32) = (3, 20);

    pub fn validate(&self) -> Result<(), SettingsError> {
        let (min, max) = Self::WIN_POINTS_RANGE;
        if !(min..=max).contains(&self.win_points) {
            return Err(SettingsError::WinPointsOutOfRange { min, max });
        }
        let (min, max) = Self::DISCARD_LIMIT_RANGE;
        if !(min..=max).contains(&self.discard_limit) {
            return Err(SettingsError::DiscardLimitOutOfRange { min, max });
        }
        if self.map_mode == MapMode::Draft && !self.team_mode {
            return Err(SettingsError::DraftNeedsTeams);
        }
        if self.spell_draft_first_team > 1 {
            return Err(SettingsError::UnknownTeam(self.spell_draft_first_team));
        }
        Ok(())
    }

    /// The settings with `update` applied, if they are still valid
    pub fn updated(&self, update: &SettingsUpdate) -> Result<Self, SettingsError> {
        let next = Self {
            win_points: update.win_points.unwrap_or(self.win_points),
            discard_limit: update.discard_limit.unwrap_or(self.discard_limit),
            team_mode: update.team_mode.unwrap_or(self.team_mode),
            map_mode: update.map_mode.unwrap_or(self.map_mode),
            spell_draft_first_team: update
                .spell_draft_first_team
                .unwrap_or(self.spell_draft_first_team),
        };
        next.validate()?;
        Ok(next)
    }

    /// Whether the match runs the tile auction before setup
    pub fn uses_draft(&self) -> bool {
        self.team_mode && self.map_mode == MapMode::Draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(GameSettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_update_keeps_missing_fields() {
        let settings = GameSettings::default();
        let next = settings
            .updated(&SettingsUpdate {
                win_points: Some(12),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.win_points, 12);
        assert_eq!(next.discard_limit, 7);
    }

    #[test]
    fn test_draft_requires_team_mode() {
        let settings = GameSettings::default();
        let update = SettingsUpdate {
            map_mode: Some(MapMode::Draft),
            ..Default::default()
        };
        assert_eq!(settings.updated(&update), Err(SettingsError::DraftNeedsTeams));

        let update = SettingsUpdate {
            map_mode: Some(MapMode::Draft),
            team_mode: Some(true),
            ..Default::default()
        };
        assert!(settings.updated(&update).unwrap().uses_draft());
    }

    #[test]
    fn test_out_of_range_values() {
        let settings = GameSettings::default();
        assert!(matches!(
            settings.updated(&SettingsUpdate {
                discard_limit: Some(0),
                ..Default::default()
            }),
            Err(SettingsError::DiscardLimitOutOfRange { .. })
        ));
        assert_eq!(
            settings.updated(&SettingsUpdate {
                spell_draft_first_team: Some(2),
                ..Default::default()
            }),
            Err(SettingsError::UnknownTeam(2))
        );
    }
}
