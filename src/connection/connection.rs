//! The WebSocket connection: framing state machine, control-frame handling,
//! and the closing handshake.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::config::{Config, MIN_WRITE_BUFFER_SIZE};
use crate::connection::reader::MessageReader;
use crate::connection::writer::MessageWriter;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::message::{close_payload, CloseCode, MessageType};
use crate::protocol::frame::{encode_frame, FrameHeader, MAX_CONTROL_PAYLOAD};
use crate::protocol::mask::apply_mask;
use crate::protocol::opcode::OpCode;
use crate::protocol::random_array;
use crate::protocol::utf8::Utf8Validator;

/// Handler invoked for every well-formed incoming close frame.
///
/// Receives the peer's code (inferred [`CloseCode::NoStatus`] when the frame
/// carried no payload) and reason. The returned pair, if any, is written
/// back as our close frame through the connection's control path. The
/// default mirrors the received code and reason.
pub type CloseHandler = Box<dyn FnMut(CloseCode, &str) -> Option<(CloseCode, String)> + Send>;

/// Handler invoked for every incoming ping frame.
///
/// The returned payload, if any, is sent back as a pong. The default echoes
/// the ping's payload.
pub type PingHandler = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// Handler invoked for every incoming pong frame. The default does nothing.
pub type PongHandler = Box<dyn FnMut(&[u8]) + Send>;

fn default_close_handler() -> CloseHandler {
    Box::new(|code, reason| Some((code, reason.to_string())))
}

fn default_ping_handler() -> PingHandler {
    Box::new(|payload| Some(payload.to_vec()))
}

fn default_pong_handler() -> PongHandler {
    Box::new(|_payload| {})
}

/// Cap a close reason at the 123 bytes that fit a control frame alongside
/// the 2-byte code, without splitting a code point.
fn truncate_reason(reason: &str) -> &str {
    let max = MAX_CONTROL_PAYLOAD - 2;
    if reason.len() <= max {
        return reason;
    }
    let mut end = max;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

/// Progress of the message currently being read.
struct ReadState {
    message_type: MessageType,
    /// Unread payload bytes of the current frame.
    remaining: u64,
    /// Whether the current frame is the message's last.
    fin: bool,
    mask: Option<[u8; 4]>,
    /// Key phase for payload delivered so far from the current frame.
    mask_offset: usize,
    utf8: Utf8Validator,
    /// Total payload bytes delivered for this message.
    total: usize,
}

/// Progress of the message currently being written.
struct WriteState {
    message_type: MessageType,
    is_first: bool,
}

/// A WebSocket connection over an established, already-upgraded byte stream.
///
/// The connection owns the transport exclusively. Messages are read through
/// [`next_reader`](Connection::next_reader) and written through
/// [`next_writer`](Connection::next_writer); at most one of each can exist
/// at a time, enforced by the borrow the reader/writer holds on the
/// connection. Control frames are consumed transparently between data
/// frames and answered by the installed handlers.
///
/// ## Example
///
/// ```rust,ignore
/// use wsproto::{Config, Connection, MessageType, Role};
///
/// let mut conn = Connection::new(stream, Role::Client, Config::default());
/// conn.write_message(MessageType::Text, b"Hello").await?;
/// let (kind, data) = conn.next_message().await?;
/// conn.close().await?;
/// ```
pub struct Connection<T> {
    io: T,
    role: Role,
    config: Config,
    /// Incoming bytes; frame headers are parsed off the front, data-frame
    /// payloads stay here until a reader consumes them.
    read_buf: BytesMut,
    /// Staging buffer for the active message writer.
    write_buf: Vec<u8>,
    /// Scratch for serializing one outgoing frame.
    frame_buf: Vec<u8>,
    sent_close: bool,
    recv_close: bool,
    /// First fatal error; once set, every operation replays it.
    terminal: Option<Error>,
    read_state: Option<ReadState>,
    write_state: Option<WriteState>,
    on_close: CloseHandler,
    on_ping: PingHandler,
    on_pong: PongHandler,
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("config", &self.config)
            .field("sent_close", &self.sent_close)
            .field("recv_close", &self.recv_close)
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

impl<T> Connection<T> {
    /// Wrap an upgraded stream in a connection.
    pub fn new(io: T, role: Role, config: Config) -> Self {
        Self::with_buffered(io, role, config, &[])
    }

    /// Wrap an upgraded stream, seeding the read buffer with bytes that were
    /// read from the transport during the handshake.
    pub fn with_buffered(io: T, role: Role, config: Config, pre_read: &[u8]) -> Self {
        let config = Config {
            write_buffer_size: config.write_buffer_size.max(MIN_WRITE_BUFFER_SIZE),
            ..config
        };
        let mut read_buf = BytesMut::with_capacity(config.read_buffer_size.max(pre_read.len()));
        read_buf.extend_from_slice(pre_read);
        Self {
            io,
            role,
            write_buf: Vec::with_capacity(config.write_buffer_size),
            frame_buf: Vec::new(),
            read_buf,
            sent_close: false,
            recv_close: false,
            terminal: None,
            read_state: None,
            write_state: None,
            on_close: default_close_handler(),
            on_ping: default_ping_handler(),
            on_pong: default_pong_handler(),
            config,
        }
    }

    /// The connection's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The connection's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the closing handshake has completed in both directions.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sent_close && self.recv_close
    }

    /// Install a close handler, or `None` to restore the default (mirror the
    /// received code and reason).
    pub fn set_close_handler(&mut self, handler: Option<CloseHandler>) {
        self.on_close = handler.unwrap_or_else(default_close_handler);
    }

    /// Install a ping handler, or `None` to restore the default (answer with
    /// a pong carrying the ping's payload).
    pub fn set_ping_handler(&mut self, handler: Option<PingHandler>) {
        self.on_ping = handler.unwrap_or_else(default_ping_handler);
    }

    /// Install a pong handler, or `None` to restore the default (ignore).
    pub fn set_pong_handler(&mut self, handler: Option<PongHandler>) {
        self.on_pong = handler.unwrap_or_else(default_pong_handler);
    }

    fn check_open(&self) -> Result<()> {
        match &self.terminal {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Begin reading the next message.
    ///
    /// Any unread remainder of the previous message is discarded first.
    /// Control frames arriving before the first data frame are handled
    /// transparently.
    ///
    /// # Errors
    ///
    /// - the terminal error, if one is set;
    /// - [`Error::ConnectionClosed`] once the closing handshake completed;
    /// - [`Error::Protocol`] (fatal, close 1002) if the first frame of the
    ///   message is a continuation frame.
    pub async fn next_reader(&mut self) -> Result<(MessageType, MessageReader<'_, T>)> {
        self.check_open()?;
        if self.sent_close && self.recv_close {
            return Err(Error::ConnectionClosed);
        }

        self.drain_current_message().await?;

        let header = self.next_data_frame_header().await?;
        let message_type = match header.opcode {
            OpCode::Text => MessageType::Text,
            OpCode::Binary => MessageType::Binary,
            OpCode::Continuation => {
                let err = Error::Protocol(
                    "first frame of a message must not be a continuation frame".into(),
                );
                return Err(self.fatal(err).await);
            }
            _ => unreachable!("control frames never surface as message headers"),
        };

        self.read_state = Some(ReadState {
            message_type,
            remaining: header.payload_len,
            fin: header.fin,
            mask: header.mask,
            mask_offset: 0,
            utf8: Utf8Validator::new(),
            total: 0,
        });

        Ok((message_type, MessageReader::new(self)))
    }

    /// Read the next message whole.
    ///
    /// Convenience wrapper around [`next_reader`](Connection::next_reader)
    /// plus read-to-end.
    pub async fn next_message(&mut self) -> Result<(MessageType, Vec<u8>)> {
        let (message_type, mut reader) = self.next_reader().await?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        Ok((message_type, data))
    }

    /// Deliver up to `buf.len()` payload bytes of the in-flight message.
    /// Returns 0 at end of message.
    pub(super) async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let Some(state) = self.read_state.as_ref() else {
                return Ok(0);
            };

            if state.remaining == 0 {
                if state.fin {
                    let mut state = self.read_state.take().expect("reader state");
                    if state.message_type == MessageType::Text {
                        // A code point still open at message end is invalid.
                        if let Err(err) = state.utf8.feed(&[], true) {
                            return Err(self.fatal(err).await);
                        }
                    }
                    return Ok(0);
                }

                let header = self.next_data_frame_header().await?;
                if header.opcode != OpCode::Continuation {
                    let err = Error::Protocol(format!(
                        "expected continuation frame, got {}",
                        header.opcode
                    ));
                    return Err(self.fatal(err).await);
                }
                let state = self.read_state.as_mut().expect("reader state");
                state.fin = header.fin;
                state.mask = header.mask;
                state.remaining = header.payload_len;
                state.mask_offset = 0;
                continue;
            }

            if self.read_buf.is_empty() {
                if let Err(err) = self.fill_read_buf().await {
                    return Err(self.fatal(err).await);
                }
            }

            let state = self.read_state.as_mut().expect("reader state");
            let n = buf
                .len()
                .min(self.read_buf.len())
                .min(usize::try_from(state.remaining).unwrap_or(usize::MAX));
            buf[..n].copy_from_slice(&self.read_buf[..n]);
            self.read_buf.advance(n);
            if let Some(key) = state.mask {
                apply_mask(&mut buf[..n], key, state.mask_offset);
            }
            state.mask_offset += n;
            state.remaining -= n as u64;
            state.total += n;

            let total = state.total;
            let is_text = state.message_type == MessageType::Text;
            let is_final_chunk = state.fin && state.remaining == 0;

            if total > self.config.max_message_size {
                let err = Error::MessageTooLarge {
                    size: total,
                    max: self.config.max_message_size,
                };
                return Err(self.fatal(err).await);
            }
            if is_text {
                let state = self.read_state.as_mut().expect("reader state");
                if let Err(err) = state.utf8.feed(&buf[..n], is_final_chunk) {
                    return Err(self.fatal(err).await);
                }
            }
            return Ok(n);
        }
    }

    /// Read and discard the remainder of the in-flight message, if any.
    async fn drain_current_message(&mut self) -> Result<()> {
        if self.read_state.is_none() {
            return Ok(());
        }
        trace!("discarding remainder of previous message");
        let mut scratch = [0u8; 4096];
        loop {
            if self.read_chunk(&mut scratch).await? == 0 {
                return Ok(());
            }
        }
    }

    /// Read the next data-frame header, applying the fatal path to protocol
    /// and transport errors. Close-handshake completion passes through
    /// untouched: its bookkeeping already happened.
    async fn next_data_frame_header(&mut self) -> Result<FrameHeader> {
        match self.read_frame_header().await {
            Ok(header) => Ok(header),
            Err(err) if err.is_closed() => Err(err),
            Err(err) => Err(self.fatal(err).await),
        }
    }

    /// Parse frame headers until a data frame arrives, consuming control
    /// frames inline. The data frame's payload is left in the read buffer.
    async fn read_frame_header(&mut self) -> Result<FrameHeader> {
        loop {
            let header = loop {
                match FrameHeader::parse(&self.read_buf)? {
                    Some((header, consumed)) => {
                        self.read_buf.advance(consumed);
                        break header;
                    }
                    None => self.fill_read_buf().await?,
                }
            };
            trace!(
                fin = header.fin,
                opcode = %header.opcode,
                len = header.payload_len,
                "read frame header"
            );
            header.validate(self.role)?;

            if !header.opcode.is_control() {
                return Ok(header);
            }

            // Control payloads are bounded at 125 bytes; read them whole.
            let len = header.payload_len as usize;
            while self.read_buf.len() < len {
                self.fill_read_buf().await?;
            }
            let mut payload = self.read_buf.split_to(len).to_vec();
            if let Some(key) = header.mask {
                apply_mask(&mut payload, key, 0);
            }

            match header.opcode {
                OpCode::Close => return Err(self.process_close_frame(&payload).await),
                OpCode::Ping => self.process_ping_frame(&payload).await?,
                OpCode::Pong => self.process_pong_frame(&payload),
                _ => unreachable!("is_control covers exactly these opcodes"),
            }
        }
    }

    /// Handle an incoming close frame. Always yields the error that ends the
    /// read: [`Error::ConnectionClosed`] for a well-formed close, or the
    /// protocol failure the frame contains.
    async fn process_close_frame(&mut self, payload: &[u8]) -> Error {
        self.recv_close = true;

        if payload.len() == 1 {
            return Error::Protocol("close frame payload length of 1".into());
        }
        let (code, reason) = if payload.len() >= 2 {
            let raw = u16::from_be_bytes([payload[0], payload[1]]);
            let code = CloseCode::from_u16(raw);
            if !code.is_valid() {
                return Error::InvalidCloseCode(raw);
            }
            match std::str::from_utf8(&payload[2..]) {
                Ok(reason) => (code, reason),
                Err(_) => return Error::InvalidUtf8,
            }
        } else {
            (CloseCode::NoStatus, "")
        };

        debug!(code = %code, reason, "received close frame");
        if let Some((code, reason)) = (self.on_close)(code, reason) {
            if let Err(err) = self.send_close_frame(code, &reason).await {
                debug!(error = %err, "failed to answer close frame");
            }
        }
        if self.terminal.is_none() {
            self.terminal = Some(Error::ConnectionClosed);
        }
        if self.sent_close && self.recv_close {
            let _ = self.io.shutdown().await;
        }
        Error::ConnectionClosed
    }

    async fn process_ping_frame(&mut self, payload: &[u8]) -> Result<()> {
        trace!(len = payload.len(), "received ping");
        if let Some(data) = (self.on_ping)(payload) {
            self.write_control_frame(OpCode::Pong, &data).await?;
        }
        Ok(())
    }

    fn process_pong_frame(&mut self, payload: &[u8]) {
        trace!(len = payload.len(), "received pong");
        (self.on_pong)(payload);
    }

    /// Pull more bytes from the transport into the read buffer.
    async fn fill_read_buf(&mut self) -> Result<()> {
        self.read_buf.reserve(4096);
        let n = self.io.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            return Err(Error::Io("unexpected end of stream".into()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    /// Begin writing a message of the given type.
    ///
    /// Only [`MessageType::Text`] and [`MessageType::Binary`] take the data
    /// path; control messages go through
    /// [`write_control`](Connection::write_control). A previous writer that
    /// was dropped without closing is finished (its final frame emitted)
    /// first.
    ///
    /// # Errors
    ///
    /// - the terminal error, if one is set;
    /// - [`Error::ConnectionClosed`] once either close flag is set;
    /// - [`Error::Misuse`] for control message types.
    pub async fn next_writer(&mut self, message_type: MessageType) -> Result<MessageWriter<'_, T>> {
        self.check_open()?;
        if !message_type.is_data() {
            return Err(Error::Misuse(format!(
                "{message_type} messages use write_control, not the data path"
            )));
        }
        if self.sent_close || self.recv_close {
            return Err(Error::ConnectionClosed);
        }

        self.flush_writer_frame(true).await?;
        self.write_buf.clear();
        self.write_state = Some(WriteState {
            message_type,
            is_first: true,
        });
        Ok(MessageWriter::new(self))
    }

    /// Write a complete data message.
    ///
    /// Messages larger than the write buffer are fragmented on buffer
    /// boundaries.
    pub async fn write_message(&mut self, message_type: MessageType, data: &[u8]) -> Result<()> {
        let mut writer = self.next_writer(message_type).await?;
        writer.write(data).await?;
        writer.close().await
    }

    /// Write a single control frame.
    ///
    /// The frame is always final. Writing a close frame sets `sent_close`;
    /// a second close write is a no-op.
    ///
    /// # Errors
    ///
    /// - the terminal error, if one is set;
    /// - [`Error::Misuse`] for data message types or payloads over 125 bytes.
    pub async fn write_control(&mut self, message_type: MessageType, data: &[u8]) -> Result<()> {
        if !message_type.is_control() {
            return Err(Error::Misuse(format!(
                "{message_type} is not a control message type"
            )));
        }
        if data.len() > MAX_CONTROL_PAYLOAD {
            return Err(Error::Misuse(format!(
                "control payload must be at most 125 bytes, got {}",
                data.len()
            )));
        }
        if message_type == MessageType::Close {
            if self.sent_close {
                debug!("close frame already sent, skipping");
                return Ok(());
            }
            self.check_open()?;
            self.sent_close = true;
        } else {
            self.check_open()?;
        }

        match self.write_control_frame(message_type.opcode(), data).await {
            Err(err @ Error::Io(_)) => Err(self.fatal(err).await),
            other => other,
        }
    }

    /// Write a close frame carrying `code` and `reason`.
    pub async fn write_close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        let payload = close_payload(code, reason);
        self.write_control(MessageType::Close, &payload).await
    }

    pub(super) async fn writer_write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_open()?;
        let mut rest = data;
        while !rest.is_empty() {
            let available = self.config.write_buffer_size - self.write_buf.len();
            if available == 0 {
                self.flush_writer_frame(false).await?;
                continue;
            }
            let take = available.min(rest.len());
            self.write_buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        Ok(data.len())
    }

    /// Emit the buffered bytes of the active message as one frame and reset
    /// the buffer. No-op when no writer is active.
    pub(super) async fn flush_writer_frame(&mut self, is_final: bool) -> Result<()> {
        let opcode = match self.write_state.as_mut() {
            Some(state) => {
                let opcode = if state.is_first {
                    state.message_type.opcode()
                } else {
                    OpCode::Continuation
                };
                state.is_first = false;
                opcode
            }
            None => return Ok(()),
        };
        if is_final {
            self.write_state = None;
        }

        let buf = std::mem::take(&mut self.write_buf);
        let result = self.write_frame_raw(is_final, opcode, &buf).await;
        self.write_buf = buf;
        self.write_buf.clear();

        match result {
            Err(err @ Error::Io(_)) => Err(self.fatal(err).await),
            other => other,
        }
    }

    async fn write_control_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(Error::Misuse(format!(
                "control payload must be at most 125 bytes, got {}",
                payload.len()
            )));
        }
        self.write_frame_raw(true, opcode, payload).await
    }

    /// Serialize and send one frame. Clients mask with a fresh random key
    /// per frame.
    async fn write_frame_raw(&mut self, fin: bool, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let mask = if self.role.must_mask() {
            Some(random_array()?)
        } else {
            None
        };
        self.frame_buf.clear();
        encode_frame(&mut self.frame_buf, fin, opcode, payload, mask);
        trace!(
            fin,
            opcode = %opcode,
            len = payload.len(),
            masked = mask.is_some(),
            "writing frame"
        );
        self.io.write_all(&self.frame_buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Send our close frame exactly once, bypassing the terminal check so
    /// the fatal path can still announce its close code.
    async fn send_close_frame(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if self.sent_close {
            return Ok(());
        }
        self.sent_close = true;
        debug!(code = %code, reason, "sending close frame");
        let payload = close_payload(code, reason);
        self.write_frame_raw(true, OpCode::Close, &payload).await
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// Run the closing handshake with code 1000 and no reason.
    pub async fn close(&mut self) -> Result<()> {
        self.close_with(CloseCode::Normal, "").await
    }

    /// Run the closing handshake: send our close frame, wait up to the
    /// configured close timeout for the peer's, then close the transport.
    ///
    /// The transport is closed on every path out of this method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CloseTimeout`] when the peer never answers, or the
    /// transport error that interrupted the exchange.
    pub async fn close_with(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if self.sent_close && self.recv_close {
            let _ = self.io.shutdown().await;
            return Ok(());
        }

        if let Err(err) = self.send_close_frame(code, reason).await {
            let _ = self.io.shutdown().await;
            return Err(err);
        }

        let result = self.await_close_frame().await;
        let _ = self.io.shutdown().await;
        result
    }

    /// Read and discard frames until the peer's close frame arrives or the
    /// close timeout elapses.
    async fn await_close_frame(&mut self) -> Result<()> {
        if self.recv_close {
            return Ok(());
        }
        debug!(timeout = ?self.config.close_timeout, "waiting for peer close frame");
        let deadline = tokio::time::Instant::now() + self.config.close_timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.read_frame_header()).await {
                Err(_elapsed) => return Err(Error::CloseTimeout),
                Ok(Err(err)) if err.is_closed() => return Ok(()),
                Ok(Err(err)) => return Err(self.fatal(err).await),
                Ok(Ok(header)) => {
                    trace!(opcode = %header.opcode, "discarding frame while awaiting close");
                    self.discard_payload(header.payload_len).await?;
                }
            }
        }
    }

    async fn discard_payload(&mut self, mut remaining: u64) -> Result<()> {
        while remaining > 0 {
            if self.read_buf.is_empty() {
                self.fill_read_buf().await?;
            }
            let n = usize::try_from(remaining.min(self.read_buf.len() as u64))
                .expect("bounded by buffer length");
            self.read_buf.advance(n);
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Record the first fatal error, announce its close code to the peer
    /// when it has one, and tear the transport down. Idempotent on the
    /// terminal slot; a completed close handshake passes through untouched.
    pub(super) async fn fatal(&mut self, err: Error) -> Error {
        if self.terminal.is_none() {
            self.terminal = Some(err.clone());
        }
        if err.is_closed() {
            return err;
        }
        debug!(error = %err, "fatal connection error");
        if let Some(code) = err.close_code() {
            let reason = err.to_string();
            let _ = self.send_close_frame(code, truncate_reason(&reason)).await;
        }
        let _ = self.io.shutdown().await;
        err
    }
}
