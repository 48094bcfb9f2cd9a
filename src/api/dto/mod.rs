pub mod stream_dto;
