//! Declarative songs — the note-event schema and the bundled demo catalog.
//!
//! A song is a flat list of notes, each with its own start offset, so it
//! can be authored in any order. Catalogs are JSON arrays of songs:
//!
//! ```json
//! [{"id": "intro", "name": "Intro", "bpm": 100, "durationSeconds": 4,
//!   "notes": [{"note": "C4", "duration": 0.5, "delay": 0, "wave": "square"}]}]
//! ```

use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::error::EngineError;

/// One timed note of a song. Unset overrides fall back to the song defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongNote {
    /// Pitch name, e.g. `"F#3"`.
    pub note: String,
    /// Seconds the note sounds.
    pub duration: f64,
    /// Seconds from song start.
    pub delay: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<Waveform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<f64>,
}

impl SongNote {
    /// A note with no overrides.
    pub fn new(note: impl Into<String>, delay: f64, duration: f64) -> Self {
        SongNote {
            note: note.into(),
            duration,
            delay,
            wave: None,
            volume: None,
            pan: None,
            attack: None,
            release: None,
        }
    }
}

/// Display information carried alongside a song's notes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SongMetadata {
    pub name: String,
    pub description: String,
    pub bpm: f64,
    /// Nominal length; the finish callback fires half a second after it.
    pub duration_seconds: f64,
    /// CSS color used by track pickers.
    pub color: String,
    #[serde(alias = "emoji")]
    pub icon: String,
}

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    #[serde(flatten)]
    pub metadata: SongMetadata,
    pub notes: Vec<SongNote>,
}

impl Song {
    pub fn new(id: impl Into<String>, duration_seconds: f64, notes: Vec<SongNote>) -> Self {
        let id = id.into();
        Song {
            metadata: SongMetadata {
                name: id.clone(),
                duration_seconds,
                ..Default::default()
            },
            id,
            notes,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.metadata.duration_seconds
    }

    /// Parse a single song.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a catalog (a JSON array of songs).
pub fn catalog_from_json(json: &str) -> Result<Vec<Song>, EngineError> {
    Ok(serde_json::from_str(json)?)
}

const DEMO_CATALOG: &str = include_str!("../assets/demo_songs.json");

/// The songs bundled with the crate.
pub fn demo_songs() -> Result<Vec<Song>, EngineError> {
    catalog_from_json(DEMO_CATALOG)
}

/// Look up a bundled song by id.
pub fn find_demo(id: &str) -> Result<Option<Song>, EngineError> {
    Ok(demo_songs()?.into_iter().find(|song| song.id == id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch;

    #[test]
    fn demo_catalog_loads() {
        let songs = demo_songs().expect("bundled catalog parses");
        let ids: Vec<&str> = songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            ["neon-dreams", "cyber-pulse", "midnight-waltz", "blue-horizon", "digital-fire"]
        );
        for song in &songs {
            assert!(!song.notes.is_empty(), "{} has no notes", song.id);
            assert!(song.duration_seconds() > 0.0);
            assert!(!song.metadata.name.is_empty());
        }
    }

    #[test]
    fn demo_notes_fit_their_songs() {
        for song in demo_songs().expect("bundled catalog parses") {
            for note in &song.notes {
                assert!(
                    pitch::frequency(&note.note).is_some(),
                    "{}: unknown pitch {}",
                    song.id,
                    note.note
                );
                assert!(note.delay >= 0.0 && note.duration > 0.0);
                assert!(
                    note.delay < song.duration_seconds() + 0.5,
                    "{}: note at {} starts after the finish",
                    song.id,
                    note.delay
                );
            }
        }
    }

    #[test]
    fn find_demo_by_id() {
        let song = find_demo("cyber-pulse").expect("catalog").expect("present");
        assert_eq!(song.metadata.name, "Cyber Pulse");
        assert!(find_demo("nope").expect("catalog").is_none());
    }

    #[test]
    fn minimal_song_json() {
        let song = Song::from_json(
            r#"{"id": "one", "durationSeconds": 1,
                "notes": [{"note": "C4", "delay": 0, "duration": 0.5}]}"#,
        )
        .expect("valid song");
        assert_eq!(song.duration_seconds(), 1.0);
        assert_eq!(song.notes, vec![SongNote::new("C4", 0.0, 0.5)]);
        assert_eq!(song.metadata.bpm, 0.0);
    }

    #[test]
    fn overrides_and_emoji_alias() {
        let song = Song::from_json(
            r#"{"id": "x", "name": "X", "emoji": "🎹", "bpm": 120, "durationSeconds": 2,
                "notes": [{"note": "A4", "delay": 0.5, "duration": 0.25,
                           "wave": "sawtooth", "volume": 0.3, "pan": -0.5}]}"#,
        )
        .expect("valid song");
        assert_eq!(song.metadata.icon, "🎹");
        let note = &song.notes[0];
        assert_eq!(note.wave, Some(Waveform::Sawtooth));
        assert_eq!(note.volume, Some(0.3));
        assert_eq!(note.pan, Some(-0.5));
        assert_eq!(note.attack, None);
    }

    #[test]
    fn serializes_back_to_schema() {
        let song = Song::new("s", 3.0, vec![SongNote::new("E4", 1.0, 0.5)]);
        let json = song.to_json().expect("serializes");
        assert!(json.contains("\"durationSeconds\":3.0"));
        assert!(!json.contains("\"wave\""), "unset overrides are omitted");
        assert_eq!(Song::from_json(&json).expect("parses"), song);
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let err = catalog_from_json(r#"[{"id": "broken"}]"#).unwrap_err();
        assert!(matches!(err, EngineError::Catalog(_)));
    }
}
