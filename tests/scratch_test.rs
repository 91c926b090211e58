mod common;

use serial_test::serial;
use svlib_dpi::{Fill, Limits, ScratchBuffer, SizeRequest, SvlibError, with_scratch};

fn small_limits() -> Limits {
    Limits {
        scratch_start_size: 16,
        scratch_longest_result: 64,
        ..Limits::DEFAULT
    }
}

#[test]
fn fresh_buffer_is_created_at_start_size() {
    for request in [SizeRequest::Existing, SizeRequest::Grow, SizeRequest::AtLeast(0)] {
        let mut buf = ScratchBuffer::new();
        assert_eq!(buf.current_size(), 0);
        assert_eq!(buf.acquire(request).len(), 256);
        assert_eq!(buf.current_size(), 256);
    }
}

#[test]
fn explicit_size_on_fresh_buffer_is_exact() {
    let mut buf = ScratchBuffer::new();
    assert_eq!(buf.acquire(SizeRequest::AtLeast(40)).len(), 40);
}

#[test]
fn buffer_grows_but_never_shrinks() {
    let mut buf = ScratchBuffer::new();
    assert_eq!(buf.acquire(SizeRequest::AtLeast(1000)).len(), 1000);
    assert_eq!(buf.acquire(SizeRequest::AtLeast(10)).len(), 1000);
    assert_eq!(buf.acquire(SizeRequest::Existing).len(), 1000);
    assert_eq!(buf.acquire(SizeRequest::Grow).len(), 2000);
    assert_eq!(buf.acquire(SizeRequest::AtLeast(2001)).len(), 2001);
    assert_eq!(buf.current_size(), 2001);
}

#[test]
fn signed_size_convention() {
    assert_eq!(SizeRequest::from_signed(0), SizeRequest::Existing);
    assert_eq!(SizeRequest::from_signed(-1), SizeRequest::Grow);
    assert_eq!(SizeRequest::from_signed(-4096), SizeRequest::Grow);
    assert_eq!(SizeRequest::from_signed(300), SizeRequest::AtLeast(300));
}

#[test]
fn retry_doubles_until_result_fits() {
    let mut buf = ScratchBuffer::new();
    let mut calls = Vec::new();
    let text = buf
        .write_with_retry(|b| {
            calls.push(b.len());
            if b.len() < 600 {
                return Ok(Fill::Truncated);
            }
            b[..599].fill(b'x');
            b[599] = 0;
            Ok(Fill::Done(599))
        })
        .unwrap();
    assert_eq!(text.to_bytes().len(), 599);
    assert_eq!(calls, vec![256, 512, 1024]);
    assert_eq!(buf.current_size(), 1024);
}

#[test]
fn known_size_grows_in_one_step() {
    let mut buf = ScratchBuffer::new();
    let long = "y".repeat(1000);
    let text = buf.write_str(&long).unwrap();
    assert_eq!(text.to_str().unwrap(), long);
    assert_eq!(buf.current_size(), 1001);
}

#[test]
fn retry_gives_up_at_the_cap() {
    let mut buf = ScratchBuffer::with_limits(small_limits());
    let mut sizes = Vec::new();
    let err = buf
        .write_with_retry(|b| {
            sizes.push(b.len());
            Ok(Fill::Truncated)
        })
        .unwrap_err();
    assert!(matches!(err, SvlibError::ResultTooLong { limit: 64 }));
    assert_eq!(err.code(), libc::ERANGE);
    assert_eq!(sizes, vec![16, 32, 64]);
}

#[test]
fn required_size_past_the_cap_fails_immediately() {
    let mut buf = ScratchBuffer::with_limits(small_limits());
    let err = buf.write_bytes(&[b'z'; 100]).unwrap_err();
    assert!(matches!(err, SvlibError::ResultTooLong { .. }));
}

#[test]
fn producer_errors_are_propagated() {
    let mut buf = ScratchBuffer::new();
    let err = buf
        .write_with_retry(|_| Err(SvlibError::AccessDenied))
        .unwrap_err();
    assert_eq!(err.code(), libc::EACCES);
}

#[test]
fn interior_nul_is_rejected() {
    let mut buf = ScratchBuffer::new();
    let err = buf.write_bytes(b"a\0b").unwrap_err();
    assert!(matches!(err, SvlibError::InvalidArgument(_)));
    assert_eq!(err.code(), libc::EINVAL);
}

#[test]
#[serial]
fn shared_buffer_keeps_its_size() {
    let first = with_scratch(|s| {
        s.write_str(&"q".repeat(700)).unwrap();
        s.current_size()
    });
    let second = with_scratch(|s| {
        assert_eq!(s.write_str("short").unwrap().to_bytes(), b"short");
        s.current_size()
    });
    assert!(first >= 701);
    assert_eq!(first, second);
}
