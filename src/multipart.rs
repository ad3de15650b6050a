//! Hand-built multipart/form-data bodies for the solve upload.
//!
//! The service expects a fixed boundary marker and the legacy comma form of
//! the Content-Type value, so the body is assembled by hand instead of going
//! through a generic multipart encoder.

/// Boundary marker the service has always been driven with.
pub const BOUNDARY: &str = "ThiS_CouLd__Be_AnYTHING";

/// Builder for a multipart/form-data request body.
pub struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append a plain text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part();
        self.buf.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    /// Append a binary file field.
    pub fn file(mut self, name: &str, filename: &str, mime: &str, content: &[u8]) -> Self {
        self.open_part();
        self.buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Transfer-Encoding: binary\r\n\
                 Content-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    /// Close the body with the terminating boundary.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.buf
    }

    fn open_part(&mut self) {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

/// Content-Type header value the service expects. The comma separator is part
/// of the wire contract, not the RFC semicolon form.
pub fn content_type() -> String {
    format!("multipart/form-data, boundary={BOUNDARY}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_field_framing() {
        let body = MultipartBody::new().text("function", "balance").finish();
        let body = String::from_utf8(body).unwrap();
        assert_eq!(
            body,
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"function\"\r\n\r\n\
                 balance\r\n\
                 --{BOUNDARY}--\r\n"
            )
        );
    }

    #[test]
    fn file_part_carries_filename_mime_and_raw_bytes() {
        let body = MultipartBody::new()
            .file("pict", "image.jpeg", "image/jpeg", &[0xff, 0xd8, 0xff])
            .finish();
        let head = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"pict\"; filename=\"image.jpeg\"\r\n\
             Content-Transfer-Encoding: binary\r\n\
             Content-Type: image/jpeg\r\n\r\n"
        );
        assert!(body.starts_with(head.as_bytes()));
        assert_eq!(&body[head.len()..head.len() + 3], &[0xff, 0xd8, 0xff]);
        assert!(body.ends_with(format!("\r\n--{BOUNDARY}--\r\n").as_bytes()));
    }

    #[test]
    fn parts_stack_in_insertion_order() {
        let body = MultipartBody::new()
            .text("username", "demo")
            .text("password", "secret")
            .finish();
        let body = String::from_utf8(body).unwrap();
        let user_at = body.find("name=\"username\"").unwrap();
        let pass_at = body.find("name=\"password\"").unwrap();
        assert!(user_at < pass_at);
        assert_eq!(body.matches(&format!("--{BOUNDARY}\r\n")).count(), 2);
    }

    #[test]
    fn content_type_uses_comma_form() {
        assert_eq!(
            content_type(),
            format!("multipart/form-data, boundary={BOUNDARY}")
        );
    }
}
