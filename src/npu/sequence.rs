//! Builder for host-synthesized instruction streams.
//!
//! The host sometimes has to program the NPU itself (runtime parameters,
//! extra queue pushes, token waits) instead of only replaying the stream
//! the compiler emitted. [`InstructionSequence`] appends encoded commands
//! for one explicit [`DeviceContext`] and produces a complete stream with a
//! correct header.
//!
//! Every append is validated before the buffer is touched, so a rejected
//! command leaves the sequence unchanged.

use super::command::{
    ChannelDirection, DdrPatch, Encodable, IssueToken, QueueWrite, RegisterWrite, TileLocation,
};
use super::error::Result;
use super::header::{DeviceContext, StreamHeader};
use super::parser::Disassembly;

/// A stream under construction.
#[derive(Debug, Clone)]
pub struct InstructionSequence {
    device: DeviceContext,
    body: Vec<u32>,
    command_count: u32,
}

impl InstructionSequence {
    /// Empty sequence for `device`.
    pub fn new(device: DeviceContext) -> Self {
        Self {
            device,
            body: Vec::new(),
            command_count: 0,
        }
    }

    /// Empty sequence for the device a stream header describes.
    pub fn for_header(header: &StreamHeader) -> Self {
        Self::new(header.device())
    }

    /// Target device.
    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    /// Append any encodable command.
    pub fn push(&mut self, command: &impl Encodable) -> Result<()> {
        self.device.check(command.location())?;
        command.encode_into(&mut self.body)?;
        self.command_count += 1;
        Ok(())
    }

    /// Append a 32-bit register write.
    pub fn write_register(&mut self, location: TileLocation, address: u32, value: u32) -> Result<()> {
        self.push(&RegisterWrite::new(location, address, value))
    }

    /// Append a runtime-parameter write.
    pub fn write_rtp(&mut self, location: TileLocation, address: u32, value: u32) -> Result<()> {
        log::debug!("RTP write {} 0x{:05x} = {}", location, address, value);
        self.write_register(location, address, value)
    }

    /// Append a task-queue push of `bd_id`.
    pub fn push_queue(
        &mut self,
        location: TileLocation,
        direction: ChannelDirection,
        channel: u8,
        bd_id: u8,
        issue_token: bool,
    ) -> Result<()> {
        self.push(&QueueWrite::new(location, direction, channel, bd_id).with_issue_token(issue_token))
    }

    /// Append an issue-token request.
    pub fn issue_token(
        &mut self,
        location: TileLocation,
        direction: ChannelDirection,
        channel: u8,
        controller_packet_id: u32,
    ) -> Result<()> {
        self.push(&IssueToken::new(location, direction, channel, controller_packet_id))
    }

    /// Append a host address patch of `bd_id`.
    pub fn patch_address(
        &mut self,
        location: TileLocation,
        bd_id: u8,
        arg_idx: u32,
        arg_offset: u32,
    ) -> Result<()> {
        self.push(&DdrPatch::new(location, bd_id, arg_idx, arg_offset))
    }

    /// Re-append the raw words of every command decoded from another stream.
    ///
    /// Decode-only commands are copied as-is. Unknown words and padding are
    /// dropped. Returns the number of commands appended.
    pub fn replay(&mut self, disassembly: &Disassembly<'_>) -> Result<usize> {
        for (command, _) in disassembly.command_words() {
            self.device.check(command.location())?;
        }

        let mut replayed = 0;
        for (command, words) in disassembly.command_words() {
            log::debug!("Replaying {} ({} words)", command.name(), words.len());
            self.body.extend_from_slice(words);
            replayed += 1;
        }
        self.command_count += replayed as u32;
        Ok(replayed)
    }

    /// Number of commands appended.
    pub fn len(&self) -> usize {
        self.command_count as usize
    }

    /// Check if nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.command_count == 0
    }

    /// Words appended so far, header excluded.
    pub fn body(&self) -> &[u32] {
        &self.body
    }

    /// Header matching the current contents.
    pub fn header(&self) -> StreamHeader {
        self.device.header(self.command_count, self.body.len() as u32)
    }

    /// Complete stream: header followed by the body.
    pub fn finish(self) -> Result<Vec<u32>> {
        let header = self.header().encode()?;
        let mut words = Vec::with_capacity(header.len() + self.body.len());
        words.extend_from_slice(&header);
        words.extend(self.body);
        Ok(words)
    }
}
