//! The media stream of a preview is a series of sub packets each opening
//! with a four byte magic that selects the layout: I frames, P frames, AAC
//! audio and stream info. A sub packet may span several bc messages; the
//! parser reports how it would like more bytes so the stream layer can
//! reassemble.

/// Contains the structure of the media sub packets
pub mod model;

/// Contains code related to the deserialisation of the media sub packets
pub mod de;
