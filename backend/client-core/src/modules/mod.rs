//! Catalog of transmission modules and their argument schemas.

mod form;

pub use form::{ModuleForm, ModuleForms};

use crate::protocol::FileCategory;

use std::collections::HashMap;

use once_cell::sync::Lazy;

pub const DEFAULT_MODULE: &str = "pifmrds";
pub const LIVE_AUDIO_MODULE: &str = "audiosock-broadcast";

/// Arg key the live audio bridge fills in with the handshake endpoint.
pub const SOCKET_PATH_ARG: &str = "socketPath";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Decimal number. Whole values are sent as integers.
    Float,
    Integer,
    /// Trimmed text, omitted when empty.
    Text,
    /// Sent as `true` when set, omitted otherwise.
    Flag,
    /// Server path of a file from a browser; falls back to that browser's selection.
    File(FileCategory),
    Choice(&'static [&'static str]),
    /// `address:message` lines sent as `[{address, message}]`.
    PagerMessages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: &'static str,
    /// Only present (and then required) while another field holds this value.
    pub when: Option<(&'static str, &'static str)>,
}

impl FieldSpec {
    const fn required(key: &'static str, kind: FieldKind, default: &'static str) -> Self {
        Self {
            key,
            kind,
            required: true,
            default,
            when: None,
        }
    }

    const fn optional(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            required: false,
            default: "",
            when: None,
        }
    }

    const fn optional_with(key: &'static str, kind: FieldKind, default: &'static str) -> Self {
        Self {
            key,
            kind,
            required: false,
            default,
            when: None,
        }
    }

    const fn only_when(
        key: &'static str,
        kind: FieldKind,
        field: &'static str,
        value: &'static str,
    ) -> Self {
        Self {
            key,
            kind,
            required: true,
            default: "",
            when: Some((field, value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSpec {
    pub name: &'static str,
    pub summary: &'static str,
    pub fields: &'static [FieldSpec],
    /// Timeout sent when the form leaves it blank.
    pub default_timeout: u64,
    /// Whether play-once and intro/outro are sent.
    pub playback_options: bool,
    /// Whether the job is fed from the live audio bridge.
    pub live_audio: bool,
}

impl ModuleSpec {
    pub fn field(&self, key: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.key == key)
    }
}

use FieldKind::{Choice, File, Flag, Float, Integer, PagerMessages, Text};

const PIFMRDS_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("freq", Float, "431"),
    FieldSpec::required("audio", File(FileCategory::Audio), ""),
    FieldSpec::optional("pi", Text),
    FieldSpec::optional("ps", Text),
    FieldSpec::optional("rt", Text),
    FieldSpec::optional("ppm", Float),
];

const MORSE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::required("rate", Integer, "20"),
    FieldSpec::required("message", Text, "HACK THE PLANET"),
];

const TUNE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::optional("exitImmediate", Flag),
    FieldSpec::optional("ppm", Float),
];

const SPECTRUMPAINT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::required("pictureFile", File(FileCategory::Image), ""),
    FieldSpec::optional_with("excursion", Float, "50000"),
];

const PICHIRP_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::required("bandwidth", Float, "1000000"),
    FieldSpec::required("time", Float, "5.0"),
];

const POCSAG_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "466230000"),
    FieldSpec::required("messages", PagerMessages, ""),
    FieldSpec::optional("baudRate", Integer),
    FieldSpec::optional("functionBits", Integer),
    FieldSpec::optional("numericMode", Flag),
    FieldSpec::optional("repeatCount", Integer),
    FieldSpec::optional("invertPolarity", Flag),
];

const PISSTV_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::required("pictureFile", File(FileCategory::Image), ""),
];

const PIRTTY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::required("message", Text, "HACK THE PLANET"),
    FieldSpec::optional("spaceFrequency", Integer),
];

const PIFT8_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "14074000"),
    FieldSpec::required("message", Text, "CQ PIRATE"),
    FieldSpec::optional("ppm", Float),
    FieldSpec::optional("offset", Float),
    FieldSpec::optional("slot", Integer),
    FieldSpec::optional("repeat", Flag),
];

const FSK_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::required("inputType", Choice(&["text", "file"]), "text"),
    FieldSpec::only_when("text", Text, "inputType", "text"),
    FieldSpec::only_when("file", File(FileCategory::Data), "inputType", "file"),
    FieldSpec::optional("baudRate", Integer),
];

const SENDIQ_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("freq", Float, "431000000"),
    FieldSpec::required("inputFile", File(FileCategory::Data), ""),
    FieldSpec::optional("sampleRate", Integer),
    FieldSpec::optional("harmonic", Integer),
    FieldSpec::optional("iqType", Choice(&["i16", "u8", "float", "double"])),
    FieldSpec::optional("power", Float),
    FieldSpec::optional("loopMode", Flag),
];

const AUDIOSOCK_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("frequency", Float, "431000000"),
    FieldSpec::optional_with("sampleRate", Integer, "48000"),
    FieldSpec::optional_with(
        "modulation",
        Choice(&["AM", "DSB", "USB", "LSB", "FM", "RAW"]),
        "FM",
    ),
    FieldSpec::optional("gain", Float),
];

pub static CATALOG: &[ModuleSpec] = &[
    ModuleSpec {
        name: "pifmrds",
        summary: "FM broadcast with RDS from an audio file",
        fields: PIFMRDS_FIELDS,
        default_timeout: 30,
        playback_options: true,
        live_audio: false,
    },
    ModuleSpec {
        name: "morse",
        summary: "Morse code keying",
        fields: MORSE_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "tune",
        summary: "Carrier tone",
        fields: TUNE_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "spectrumpaint",
        summary: "Paint an image into the spectrum",
        fields: SPECTRUMPAINT_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "pichirp",
        summary: "Frequency sweep",
        fields: PICHIRP_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "pocsag",
        summary: "Pager paging",
        fields: POCSAG_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "pisstv",
        summary: "Slow-scan television",
        fields: PISSTV_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "pirtty",
        summary: "Radio teletype",
        fields: PIRTTY_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "pift8",
        summary: "FT8 digital mode",
        fields: PIFT8_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "fsk",
        summary: "Frequency-shift keying from text or a data file",
        fields: FSK_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: "sendiq",
        summary: "Replay an IQ recording",
        fields: SENDIQ_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: false,
    },
    ModuleSpec {
        name: LIVE_AUDIO_MODULE,
        summary: "Broadcast live microphone audio",
        fields: AUDIOSOCK_FIELDS,
        default_timeout: 0,
        playback_options: false,
        live_audio: true,
    },
];

static INDEX: Lazy<HashMap<&'static str, &'static ModuleSpec>> =
    Lazy::new(|| CATALOG.iter().map(|spec| (spec.name, spec)).collect());

pub fn find(name: &str) -> Option<&'static ModuleSpec> {
    INDEX.get(name).copied()
}
