use super::*;

const ENCODERS: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (codec h264)
 V....D libvpx               libvpx VP8 (codec vp8)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 A....D libopus              libopus Opus (codec opus)
 A....D aac                  AAC (Advanced Audio Coding)
";

const MUXERS: &str = "\
File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
  E mp4             MP4 (MPEG-4 Part 14)
  E webm            WebM
";

#[test]
fn parses_ffmpeg_tables() {
    let probe = FfmpegProbe::from_listings(ENCODERS, MUXERS);
    assert!(probe.has_encoder("libvpx-vp9"));
    assert!(probe.has_encoder("aac"));
    assert!(!probe.has_encoder("Encoders:"));
    assert!(!probe.has_encoder("V....."));
    assert!(probe.has_muxer("webm"));
    assert!(probe.has_muxer("mp4"));
}

#[test]
fn picks_vp9_when_everything_is_available() {
    let probe = FfmpegProbe::from_listings(ENCODERS, MUXERS);
    assert_eq!(pick_supported_format(&probe), WEBM_VP9_OPUS);
}

#[test]
fn walks_the_preference_order() {
    let no_vp9 = |f: &OutputFormat| f.video_encoder != Some("libvpx-vp9");
    assert_eq!(pick_supported_format(&no_vp9), WEBM_VP8_OPUS);

    let generic_only = |f: &OutputFormat| f.video_encoder.is_none();
    assert_eq!(pick_supported_format(&generic_only), WEBM);

    let h264_only = |f: &OutputFormat| f.video_encoder == Some("libx264");
    assert_eq!(pick_supported_format(&h264_only), WEBM_H264_OPUS);
}

#[test]
fn falls_back_to_generic_webm() {
    let nothing = |_: &OutputFormat| false;
    assert_eq!(pick_supported_format(&nothing), FALLBACK_FORMAT);
    assert_eq!(FALLBACK_FORMAT.mime, "video/webm");
}

#[test]
fn webm_rejects_h264() {
    let probe = FfmpegProbe::from_listings(ENCODERS, MUXERS);
    assert!(!probe.is_supported(&WEBM_H264_OPUS));
}

#[test]
fn missing_opus_disables_opus_formats() {
    let encoders = ENCODERS.replace("libopus", "libfoo");
    let probe = FfmpegProbe::from_listings(&encoders, MUXERS);
    assert_eq!(pick_supported_format(&probe), WEBM);
}
