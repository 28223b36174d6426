/// Decoder for the compressed wire codec.
///
/// The assembler owns buffering and the final PCM bytes; implementations own
/// only the per-frame decoding algorithm. Decoders are stateful (codec
/// history spans frames), so each capture session gets a fresh instance from
/// the factory.
pub trait AudioDecoder: Send {
    /// Decode one wire frame payload into 16 kHz mono samples.
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<i16>, String>;

    /// Short name for logs, e.g. `"opus"`.
    fn name(&self) -> &str;
}

/// Creates one decoder per capture session.
pub trait DecoderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AudioDecoder>, String>;
}
