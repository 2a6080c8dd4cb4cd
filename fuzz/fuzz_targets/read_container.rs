#![no_main]
use libfuzzer_sys::fuzz_target;

use ps2_tim2::Tim2File;

fuzz_target!(|data: &[u8]| {
	let file = Tim2File::from_bytes(data);

	if let Ok(file) = file {
		let _ = file.to_bytes();
	};
});
