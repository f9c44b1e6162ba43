/// Kind of video source, inferred from its URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Local capture device: a bare index (`0`) or `/dev/videoN`.
    Device,
    /// HTTP(S) stream, e.g. an MJPEG feed from a phone webcam app.
    Http,
    Rtsp,
    /// Anything else is handed to the decoder as a file path.
    File,
}

impl SourceKind {
    pub fn from_uri(uri: &str) -> Self {
        if parse_device_index(uri).is_some() || uri.starts_with("/dev/video") {
            SourceKind::Device
        } else if uri.starts_with("http://") || uri.starts_with("https://") {
            SourceKind::Http
        } else if uri.starts_with("rtsp://") || uri.starts_with("rtsps://") {
            SourceKind::Rtsp
        } else {
            SourceKind::File
        }
    }
}

/// Parse a `/dev/videoX` style URI or bare index and return the index.
pub fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return (index >= 0).then_some(index);
    }
    uri.strip_prefix("/dev/video")
        .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .and_then(|rest| rest.parse::<i32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_indices() {
        assert_eq!(parse_device_index("0"), Some(0));
        assert_eq!(parse_device_index("/dev/video2"), Some(2));
        assert_eq!(parse_device_index("/dev/video"), None);
        assert_eq!(parse_device_index("-1"), None);
        assert_eq!(parse_device_index("cam.mp4"), None);
    }

    #[test]
    fn kinds_from_uri() {
        assert_eq!(SourceKind::from_uri("0"), SourceKind::Device);
        assert_eq!(SourceKind::from_uri("/dev/video1"), SourceKind::Device);
        assert_eq!(
            SourceKind::from_uri("http://192.168.1.20:8080/video"),
            SourceKind::Http
        );
        assert_eq!(SourceKind::from_uri("rtsp://cam/stream"), SourceKind::Rtsp);
        assert_eq!(SourceKind::from_uri("traffic.mp4"), SourceKind::File);
    }
}
