//! Catalogue of remote procedures shipped to the board.
//!
//! Each constant is a self-contained source fragment targeting the board
//! interpreter's dialect. None of them reference host-side symbols — the
//! [`crate::remote_call`] facility appends a call expression and an output
//! `print`, then substitutes the placeholders [`TIME_OFFSET`],
//! [`HAS_BINARY_STDIO`], [`BUFFER_SIZE`] and `IS_UPY` textually before
//! sending the fragment across.
//!
//! Placeholder names as they appear in the fragments below:
#![allow(non_upper_case_globals)]

/// Token substituted with the epoch delta between host and board time.
pub const TIME_OFFSET: &str = "TIME_OFFSET";
/// Token substituted with the board's `has_binary_stdio` capability flag.
pub const HAS_BINARY_STDIO: &str = "HAS_BUFFER";
/// Token substituted with the agreed bulk-transfer chunk size.
pub const BUFFER_SIZE: &str = "BUFFER_SIZE";
/// Token substituted with `True`, letting a fragment detect it is running
/// on-board rather than being read by a host-side linter.
pub const IS_UPY: &str = "IS_UPY";

pub const BOARD_NAME: &str = r#"
def board_name():
    try:
        import board
        name = board.name
    except ImportError:
        name = 'board'
    return repr(name)
"#;

pub const TEST_BUFFER: &str = r#"
def test_buffer():
    import sys
    return hasattr(sys.stdin, 'buffer')
"#;

pub const TEST_UNHEXLIFY: &str = r#"
def test_unhexlify():
    import ubinascii
    try:
        _ = ubinascii.unhexlify
    except AttributeError:
        return False
    return True
"#;

pub const LISTDIR: &str = r#"
def listdir(dirname):
    import os
    return os.listdir(dirname)
"#;

pub const LISTDIR_STAT: &str = r#"
def listdir_stat(dirname):
    import os

    def stat(filename):
        rstat = os.stat(filename)
        if IS_UPY:
            return rstat[:7] + tuple(t + TIME_OFFSET for t in rstat[7:])
        return rstat

    if dirname == '/':
        files = os.listdir('/')
    else:
        files = os.listdir(dirname)
    result = []
    for file in files:
        path = dirname + '/' + file if dirname != '/' else '/' + file
        result.append((file, stat(path)))
    return result
"#;

pub const GET_STAT: &str = r#"
def get_stat(filename):
    import os
    try:
        rstat = os.stat(filename)
    except OSError:
        return ()
    if IS_UPY:
        return rstat[:7] + tuple(t + TIME_OFFSET for t in rstat[7:])
    return rstat
"#;

pub const GET_MODE: &str = r#"
def get_mode(filename):
    import os
    try:
        return os.stat(filename)[0]
    except OSError:
        return 0
"#;

pub const GET_FILESIZE: &str = r#"
def get_filesize(filename):
    import os
    return os.stat(filename)[6]
"#;

pub const MAKE_DIRECTORY: &str = r#"
def make_directory(dirname):
    import os
    os.mkdir(dirname)
"#;

pub const REMOVE_FILE: &str = r#"
def remove_file(filename, recursive=False, force=False):
    import os

    def remove(name):
        try:
            mode = os.stat(name)[0]
        except OSError:
            if force:
                return
            raise
        if mode & 0x4000:
            if recursive:
                for entry in os.listdir(name):
                    remove(name + '/' + entry)
                os.rmdir(name)
            else:
                os.rmdir(name)
        else:
            os.remove(name)

    remove(filename)
"#;

pub const SET_TIME: &str = r#"
def set_time(rtc_time):
    import machine
    rtc = machine.RTC()
    rtc.datetime(rtc_time)
"#;

/// Matches up with [`SEND_FILE_TO_REMOTE`]: runs on the board, copies
/// `filesize` bytes off the wire (binary or hex, per `HAS_BUFFER`) into a
/// freshly-opened local file.
pub const RECV_FILE_FROM_HOST: &str = r#"
def recv_file_from_host(dst_filename, filesize, dst_mode='wb'):
    import sys
    with open(dst_filename, dst_mode) as dst_file:
        bytes_remaining = filesize
        if HAS_BUFFER:
            buf_size = BUFFER_SIZE
        else:
            buf_size = BUFFER_SIZE // 2
        while bytes_remaining > 0:
            read_size = min(bytes_remaining, buf_size)
            if HAS_BUFFER:
                buf = sys.stdin.buffer.read(read_size)
                dst_file.write(buf)
                bytes_remaining -= read_size
            else:
                import ubinascii
                buf = sys.stdin.read(read_size)
                dst_file.write(ubinascii.unhexlify(buf))
                bytes_remaining -= read_size // 2
            sys.stdout.write('\x06')
"#;

/// Matches up with [`RECV_FILE_FROM_HOST`]: runs on the host, streams a
/// local file down to the board, one ACK per chunk.
pub const SEND_FILE_TO_REMOTE: &str = r#"
def send_file_to_remote(dev, src_file, filesize):
    if HAS_BUFFER:
        buf_size = BUFFER_SIZE
    else:
        buf_size = BUFFER_SIZE // 2
    bytes_remaining = filesize
    while bytes_remaining > 0:
        read_size = min(bytes_remaining, buf_size)
        buf = src_file.read(read_size)
        if HAS_BUFFER:
            dev.write(buf)
        else:
            import binascii
            dev.write(binascii.hexlify(buf))
        bytes_remaining -= read_size
        dev.read(1)
"#;

/// Matches up with [`SEND_FILE_TO_HOST`]: runs on the host, reads `filesize`
/// bytes off the wire from the board into a local file, ACKing each chunk.
pub const RECV_FILE_FROM_REMOTE: &str = r#"
def recv_file_from_remote(dev, dst_file, filesize):
    if not HAS_BUFFER:
        return
    buf_size = BUFFER_SIZE
    bytes_remaining = filesize
    while bytes_remaining > 0:
        read_size = min(bytes_remaining, buf_size)
        buf = dev.read(read_size)
        if HAS_BUFFER:
            dst_file.write(buf)
        else:
            import binascii
            dst_file.write(binascii.unhexlify(buf))
        bytes_remaining -= read_size
        dev.write(b'\x06')
"#;

/// Matches up with [`RECV_FILE_FROM_REMOTE`]: runs on the board, streams a
/// local file up to the host, waiting for one ACK per chunk.
pub const SEND_FILE_TO_HOST: &str = r#"
def send_file_to_host(src_filename, filesize):
    import sys
    with open(src_filename, 'rb') as src_file:
        bytes_remaining = filesize
        while bytes_remaining > 0:
            if HAS_BUFFER:
                buf_size = BUFFER_SIZE
            else:
                buf_size = BUFFER_SIZE // 2
            read_size = min(bytes_remaining, buf_size)
            buf = src_file.read(read_size)
            if HAS_BUFFER:
                sys.stdout.buffer.write(buf)
                bytes_remaining -= read_size
            else:
                import ubinascii
                sys.stdout.write(ubinascii.hexlify(buf))
                bytes_remaining -= read_size
            while sys.stdin.read(1) != '\x06':
                pass
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fragment_mentions_only_known_placeholders() {
        let fragments = [
            BOARD_NAME,
            TEST_BUFFER,
            TEST_UNHEXLIFY,
            LISTDIR,
            LISTDIR_STAT,
            GET_STAT,
            GET_MODE,
            GET_FILESIZE,
            MAKE_DIRECTORY,
            REMOVE_FILE,
            SET_TIME,
            RECV_FILE_FROM_HOST,
            SEND_FILE_TO_REMOTE,
            RECV_FILE_FROM_REMOTE,
            SEND_FILE_TO_HOST,
        ];
        for f in fragments {
            assert!(f.contains("def "), "fragment has no function definition: {f}");
        }
    }

    #[test]
    fn transfer_fragments_reference_buffer_placeholders() {
        for f in [RECV_FILE_FROM_HOST, SEND_FILE_TO_REMOTE, RECV_FILE_FROM_REMOTE, SEND_FILE_TO_HOST] {
            assert!(f.contains(HAS_BINARY_STDIO));
            assert!(f.contains(BUFFER_SIZE));
        }
    }
}
