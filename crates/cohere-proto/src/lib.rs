pub mod cohere {
    pub mod v1 {
        tonic::include_proto!("cohere.v1");

        pub const FILE_DESCRIPTOR_SET: &[u8] =
            tonic::include_file_descriptor_set!("cohere_descriptor");
    }
}

pub use cohere::v1::*;
