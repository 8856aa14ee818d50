//! NMS service types.
//!
//! The service occupies a 5-bit field in the first NMS header byte.

/// NMS service codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NmsServiceType {
    None = 0,
    Read = 1,
    Write = 2,
    InformationReport = 3,
    EventNotification = 4,
    AckEventNotification = 5,
    AlterEventConditionMonitoring = 6,
    RequestDomainUpload = 7,
    InitiateUploadSequence = 8,
    UploadSegment = 9,
    RequestDomainDownload = 10,
    InitiateDownloadSequence = 11,
    DownloadSegment = 12,
    TerminateDownloadSequence = 13,
    VerifyDomainChecksum = 14,
    ExecuteProgramInvocation = 15,
    StartProgramInvocation = 16,
    Stop = 17,
    Resume = 18,
    Reset = 19,
    Shutdown = 20,
}

impl NmsServiceType {
    /// Decodes the 5-bit service field. Codes above `Shutdown` are unassigned.
    pub fn from_u8(value: u8) -> Option<NmsServiceType> {
        let service = match value {
            0 => NmsServiceType::None,
            1 => NmsServiceType::Read,
            2 => NmsServiceType::Write,
            3 => NmsServiceType::InformationReport,
            4 => NmsServiceType::EventNotification,
            5 => NmsServiceType::AckEventNotification,
            6 => NmsServiceType::AlterEventConditionMonitoring,
            7 => NmsServiceType::RequestDomainUpload,
            8 => NmsServiceType::InitiateUploadSequence,
            9 => NmsServiceType::UploadSegment,
            10 => NmsServiceType::RequestDomainDownload,
            11 => NmsServiceType::InitiateDownloadSequence,
            12 => NmsServiceType::DownloadSegment,
            13 => NmsServiceType::TerminateDownloadSequence,
            14 => NmsServiceType::VerifyDomainChecksum,
            15 => NmsServiceType::ExecuteProgramInvocation,
            16 => NmsServiceType::StartProgramInvocation,
            17 => NmsServiceType::Stop,
            18 => NmsServiceType::Resume,
            19 => NmsServiceType::Reset,
            20 => NmsServiceType::Shutdown,
            _ => return None,
        };
        Some(service)
    }
}
