pub type Endian = byteorder::LittleEndian;
