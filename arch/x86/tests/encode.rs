use encoder_x86::{
    encode, reg, BranchType, Broadcast, Conversion, EncodeRequest, Encoding, EncodingSet, Error,
    MachineMode::{self, Legacy16, Legacy32, Long64},
    Mem, Mnemonic, OperandSizeHint, Prefixes, Rounding, Swizzle,
};

fn req(mode: MachineMode, mnemonic: Mnemonic) -> EncodeRequest {
    EncodeRequest::new(mode, mnemonic)
}

macro_rules! test {
    ($name:ident, $build:expr, [$($byte:expr),* $(,)?]) => {
        #[test]
        fn $name() {
            let req = $build;
            let mut buf = [0; 16];
            let len = encode(&req, &mut buf).expect("encode failed");
            assert_eq!(&buf[..len], &[$($byte),*][..]);
        }
    };
}

macro_rules! err {
    ($name:ident, $build:expr, $err:ident) => {
        #[test]
        fn $name() {
            let req = $build;
            let mut buf = [0; 16];
            assert_eq!(encode(&req, &mut buf), Err(Error::$err));
        }
    };
}

// Legacy ALU and data movement.

test!(add_al_bl, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::AL).push_reg(reg::BL);
    r
}, [0x00, 0xd8]);

test!(add_mem_reg, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_mem(Mem::base(reg::RBX)).push_reg(reg::ECX);
    r
}, [0x01, 0x0b]);

test!(add_reg_imm8, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::ECX).push_imm(1);
    r
}, [0x83, 0xc1, 0x01]);

test!(add_eax_imm32, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::EAX).push_imm(0x1234_5678);
    r
}, [0x05, 0x78, 0x56, 0x34, 0x12]);

test!(add_reg_imm32, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::ECX).push_imm(0x1234_5678);
    r
}, [0x81, 0xc1, 0x78, 0x56, 0x34, 0x12]);

test!(add_rex_w, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::RAX).push_reg(reg::RBX);
    r
}, [0x48, 0x01, 0xd8]);

test!(add_rex_b, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::R8B).push_reg(reg::AL);
    r
}, [0x41, 0x00, 0xc0]);

test!(add_osz16, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::AX).push_reg(reg::BX);
    r
}, [0x66, 0x01, 0xd8]);

test!(lock_add, {
    let mut r = req(Long64, Mnemonic::Add);
    r.prefixes.set(Prefixes::LOCK);
    r.push_mem(Mem::base(reg::RBX)).push_reg(reg::EAX);
    r
}, [0xf0, 0x01, 0x03]);

test!(sub_sign_extended_imm8, {
    let mut r = req(Long64, Mnemonic::Sub);
    r.push_reg(reg::RSP).push_imm(8);
    r
}, [0x48, 0x83, 0xec, 0x08]);

test!(cmp_mem_imm, {
    let mut r = req(Long64, Mnemonic::Cmp);
    r.push_mem(Mem::base(reg::RDI).size(4)).push_imm(0x100);
    r
}, [0x81, 0x3f, 0x00, 0x01, 0x00, 0x00]);

test!(mov_imm64, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::RAX).push_imm(1);
    r
}, [0x48, 0xb8, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

test!(mov_imm16, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::AX).push_imm(0x1234);
    r
}, [0x66, 0xb8, 0x34, 0x12]);

test!(mov_byte_store, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_mem(Mem::base(reg::RSI).size(1)).push_imm(0x7f);
    r
}, [0xc6, 0x06, 0x7f]);

test!(mov_spl_needs_rex, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::SPL).push_reg(reg::AL);
    r
}, [0x40, 0x88, 0xc4]);

test!(mov_high_byte, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::AH).push_reg(reg::AL);
    r
}, [0x88, 0xc4]);

// Memory forms.

test!(mov_abs_legacy, {
    let mut r = req(Legacy32, Mnemonic::Mov);
    r.push_mem(Mem::absolute(0x1000)).push_reg(reg::EAX);
    r
}, [0x89, 0x05, 0x00, 0x10, 0x00, 0x00]);

test!(mov_abs_long_uses_sib, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX).push_mem(Mem::absolute(0x1000));
    r
}, [0x8b, 0x04, 0x25, 0x00, 0x10, 0x00, 0x00]);

test!(mov_rip_relative, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::RIP).disp(0x10));
    r
}, [0x8b, 0x05, 0x10, 0x00, 0x00, 0x00]);

test!(lea_base_index_disp, {
    let mut r = req(Long64, Mnemonic::Lea);
    r.push_reg(reg::RAX)
        .push_mem(Mem::base(reg::RBX).index(reg::RCX, 4).disp(8));
    r
}, [0x48, 0x8d, 0x44, 0x8b, 0x08]);

test!(lea_r13_needs_disp8, {
    let mut r = req(Long64, Mnemonic::Lea);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::R13));
    r
}, [0x41, 0x8d, 0x45, 0x00]);

test!(rsp_base_needs_sib, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_mem(Mem::base(reg::RSP)).push_reg(reg::EAX);
    r
}, [0x89, 0x04, 0x24]);

test!(index_only, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX)
        .push_mem(Mem::absolute(0).index(reg::RBX, 4));
    r
}, [0x8b, 0x04, 0x9d, 0x00, 0x00, 0x00, 0x00]);

test!(disp8_boundary, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::RAX).disp(0x7f));
    r
}, [0x8b, 0x40, 0x7f]);

test!(disp32_boundary, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::RAX).disp(0x80));
    r
}, [0x8b, 0x80, 0x80, 0x00, 0x00, 0x00]);

test!(negative_disp8, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::RBP).disp(-4));
    r
}, [0x8b, 0x45, 0xfc]);

test!(addr16_base_index, {
    let mut r = req(Legacy16, Mnemonic::Mov);
    r.push_mem(Mem::base(reg::BX).index(reg::SI, 1)).push_reg(reg::AL);
    r
}, [0x88, 0x00]);

test!(addr16_bp_alone, {
    let mut r = req(Legacy16, Mnemonic::Mov);
    r.push_reg(reg::AL).push_mem(Mem::base(reg::BP));
    r
}, [0x8a, 0x46, 0x00]);

test!(addr16_absolute, {
    let mut r = req(Legacy16, Mnemonic::Mov);
    r.push_mem(Mem::absolute(0x1234)).push_reg(reg::AL);
    r
}, [0x88, 0x06, 0x34, 0x12]);

test!(addr16_disp16, {
    let mut r = req(Legacy16, Mnemonic::Mov);
    r.push_reg(reg::CL).push_mem(Mem::base(reg::BX).disp(0x80));
    r
}, [0x8a, 0x8f, 0x80, 0x00]);

test!(addr_size_override_long, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::EBX));
    r
}, [0x67, 0x8b, 0x03]);

test!(addr_size_override_legacy, {
    let mut r = req(Legacy32, Mnemonic::Mov);
    r.push_mem(Mem::base(reg::BX).index(reg::SI, 1)).push_reg(reg::AL);
    r
}, [0x67, 0x88, 0x00]);

test!(segment_override, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.prefixes.set(Prefixes::SEGMENT_FS);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::RBX));
    r
}, [0x64, 0x8b, 0x03]);

// Stack operations.

test!(push_reg, {
    let mut r = req(Long64, Mnemonic::Push);
    r.push_reg(reg::RBX);
    r
}, [0x53]);

test!(push_extended_reg, {
    let mut r = req(Long64, Mnemonic::Push);
    r.push_reg(reg::R12);
    r
}, [0x41, 0x54]);

test!(push_imm8, {
    let mut r = req(Long64, Mnemonic::Push);
    r.push_imm(0x10);
    r
}, [0x6a, 0x10]);

test!(push_imm32, {
    let mut r = req(Long64, Mnemonic::Push);
    r.push_imm(0x1234);
    r
}, [0x68, 0x34, 0x12, 0x00, 0x00]);

test!(push_word_mem, {
    let mut r = req(Long64, Mnemonic::Push);
    r.operand_size_hint = OperandSizeHint::O16;
    r.push_mem(Mem::base(reg::RAX));
    r
}, [0x66, 0xff, 0x30]);

test!(push_dword_in_real_mode, {
    let mut r = req(Legacy16, Mnemonic::Push);
    r.operand_size_hint = OperandSizeHint::O32;
    r.push_imm(0x1234_5678);
    r
}, [0x66, 0x68, 0x78, 0x56, 0x34, 0x12]);

test!(pop_reg, {
    let mut r = req(Long64, Mnemonic::Pop);
    r.push_reg(reg::RBX);
    r
}, [0x5b]);

test!(nop, req(Long64, Mnemonic::Nop), [0x90]);

test!(ret, req(Long64, Mnemonic::Ret), [0xc3]);

test!(ret_imm, {
    let mut r = req(Long64, Mnemonic::Ret);
    r.push_imm(8);
    r
}, [0xc2, 0x08, 0x00]);

// Atomics and string operations.

test!(xchg_mem_reg, {
    let mut r = req(Long64, Mnemonic::Xchg);
    r.push_mem(Mem::base(reg::RDX)).push_reg(reg::EBX);
    r
}, [0x87, 0x1a]);

test!(xchg_reg_mem, {
    let mut r = req(Long64, Mnemonic::Xchg);
    r.push_reg(reg::EBX).push_mem(Mem::base(reg::RDX));
    r
}, [0x87, 0x1a]);

test!(xacquire_lock_xchg, {
    let mut r = req(Long64, Mnemonic::Xchg);
    r.prefixes.set(Prefixes::XACQUIRE | Prefixes::LOCK);
    r.push_mem(Mem::base(reg::RDX)).push_reg(reg::EBX);
    r
}, [0xf2, 0xf0, 0x87, 0x1a]);

test!(cmpxchg, {
    let mut r = req(Long64, Mnemonic::Cmpxchg);
    r.push_mem(Mem::base(reg::RBX)).push_reg(reg::ECX);
    r
}, [0x0f, 0xb1, 0x0b]);

test!(movsb, req(Long64, Mnemonic::Movsb), [0xa4]);

test!(rep_movsb, {
    let mut r = req(Long64, Mnemonic::Movsb);
    r.prefixes.set(Prefixes::REP);
    r
}, [0xf3, 0xa4]);

test!(repne_scasb, {
    let mut r = req(Long64, Mnemonic::Scasb);
    r.prefixes.set(Prefixes::REPNE);
    r
}, [0xf2, 0xae]);

test!(rep_stosb_segment, {
    let mut r = req(Long64, Mnemonic::Stosb);
    r.prefixes.set(Prefixes::REP | Prefixes::SEGMENT_FS);
    r
}, [0xf3, 0x64, 0xaa]);

// Branches.

test!(jmp_short, {
    let mut r = req(Long64, Mnemonic::Jmp);
    r.push_simm(-2);
    r
}, [0xeb, 0xfe]);

test!(jmp_near_auto, {
    let mut r = req(Long64, Mnemonic::Jmp);
    r.push_simm(0x1000);
    r
}, [0xe9, 0x00, 0x10, 0x00, 0x00]);

test!(jmp_register, {
    let mut r = req(Long64, Mnemonic::Jmp);
    r.push_reg(reg::RAX);
    r
}, [0xff, 0xe0]);

test!(notrack_jmp_mem, {
    let mut r = req(Long64, Mnemonic::Jmp);
    r.prefixes.set(Prefixes::NOTRACK);
    r.push_mem(Mem::base(reg::RAX));
    r
}, [0x3e, 0xff, 0x20]);

test!(jmp_far_legacy, {
    let mut r = req(Legacy32, Mnemonic::Jmp);
    r.branch_type = BranchType::Far32;
    r.push_ptr(0x1234, 0x5678);
    r
}, [0xea, 0x78, 0x56, 0x00, 0x00, 0x34, 0x12]);

test!(call_near, {
    let mut r = req(Long64, Mnemonic::Call);
    r.push_simm(0x10);
    r
}, [0xe8, 0x10, 0x00, 0x00, 0x00]);

test!(bnd_call, {
    let mut r = req(Long64, Mnemonic::Call);
    r.prefixes.set(Prefixes::BND);
    r.push_simm(0x10);
    r
}, [0xf2, 0xe8, 0x10, 0x00, 0x00, 0x00]);

test!(call_far_real_mode, {
    let mut r = req(Legacy16, Mnemonic::Call);
    r.branch_type = BranchType::Far16;
    r.push_ptr(0x1234, 0x5678);
    r
}, [0x9a, 0x78, 0x56, 0x34, 0x12]);

test!(jz_short, {
    let mut r = req(Long64, Mnemonic::Jz);
    r.push_simm(5);
    r
}, [0x74, 0x05]);

test!(jz_near, {
    let mut r = req(Long64, Mnemonic::Jz);
    r.push_simm(0x1000);
    r
}, [0x0f, 0x84, 0x00, 0x10, 0x00, 0x00]);

test!(jz_taken_hint, {
    let mut r = req(Long64, Mnemonic::Jz);
    r.prefixes.set(Prefixes::BRANCH_TAKEN);
    r.push_simm(5);
    r
}, [0x3e, 0x74, 0x05]);

test!(jz_not_taken_hint, {
    let mut r = req(Long64, Mnemonic::Jz);
    r.prefixes.set(Prefixes::BRANCH_NOT_TAKEN);
    r.push_simm(5);
    r
}, [0x2e, 0x74, 0x05]);

test!(jz_near16_legacy, {
    let mut r = req(Legacy32, Mnemonic::Jz);
    r.branch_type = BranchType::Near16;
    r.push_simm(0x10);
    r
}, [0x66, 0x0f, 0x84, 0x10, 0x00]);

// MMX and SSE.

test!(pfadd, {
    let mut r = req(Long64, Mnemonic::Pfadd);
    r.push_reg(reg::MM0).push_reg(reg::MM1);
    r
}, [0x0f, 0x0f, 0xc1, 0x9e]);

test!(pfadd_mem, {
    let mut r = req(Long64, Mnemonic::Pfadd);
    r.push_reg(reg::MM2).push_mem(Mem::base(reg::RAX));
    r
}, [0x0f, 0x0f, 0x10, 0x9e]);

test!(addps, {
    let mut r = req(Long64, Mnemonic::Addps);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2);
    r
}, [0x0f, 0x58, 0xca]);

test!(paddd_mem, {
    let mut r = req(Long64, Mnemonic::Paddd);
    r.push_reg(reg::XMM1).push_mem(Mem::base(reg::RAX));
    r
}, [0x66, 0x0f, 0xfe, 0x08]);

test!(addss, {
    let mut r = req(Long64, Mnemonic::Addss);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2);
    r
}, [0xf3, 0x0f, 0x58, 0xca]);

test!(addsd_scalar_mem, {
    let mut r = req(Long64, Mnemonic::Addsd);
    r.push_reg(reg::XMM1).push_mem(Mem::base(reg::RAX).size(8));
    r
}, [0xf2, 0x0f, 0x58, 0x08]);

test!(pshufb_0f38, {
    let mut r = req(Long64, Mnemonic::Pshufb);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2);
    r
}, [0x66, 0x0f, 0x38, 0x00, 0xca]);

// VEX and XOP.

test!(vaddps_xmm, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2).push_reg(reg::XMM3);
    r
}, [0xc5, 0xe8, 0x58, 0xcb]);

test!(vaddps_ymm, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::YMM1).push_reg(reg::YMM2).push_reg(reg::YMM3);
    r
}, [0xc5, 0xec, 0x58, 0xcb]);

test!(vaddps_high_dest, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::XMM8).push_reg(reg::XMM2).push_reg(reg::XMM3);
    r
}, [0xc5, 0x68, 0x58, 0xc3]);

test!(vaddps_mem, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2).push_mem(Mem::base(reg::RAX));
    r
}, [0xc5, 0xe8, 0x58, 0x08]);

test!(vaddps_three_byte_form, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2).push_reg(reg::XMM8);
    r
}, [0xc4, 0xc1, 0x68, 0x58, 0xc8]);

test!(vpaddd_ymm, {
    let mut r = req(Long64, Mnemonic::Vpaddd);
    r.push_reg(reg::YMM1).push_reg(reg::YMM2).push_reg(reg::YMM3);
    r
}, [0xc5, 0xed, 0xfe, 0xcb]);

test!(vblendvps_is4, {
    let mut r = req(Long64, Mnemonic::Vblendvps);
    r.push_reg(reg::XMM1)
        .push_reg(reg::XMM2)
        .push_reg(reg::XMM3)
        .push_reg4(reg::XMM4);
    r
}, [0xc4, 0xe3, 0x69, 0x4a, 0xcb, 0x40]);

test!(vzeroupper, req(Long64, Mnemonic::Vzeroupper), [0xc5, 0xf8, 0x77]);

test!(vfrczps_xop, {
    let mut r = req(Long64, Mnemonic::Vfrczps);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2);
    r
}, [0x8f, 0xe9, 0x78, 0x80, 0xca]);

test!(vpcomb_xop_map8, {
    let mut r = req(Long64, Mnemonic::Vpcomb);
    r.push_reg(reg::XMM1)
        .push_reg(reg::XMM2)
        .push_reg(reg::XMM3)
        .push_imm(2);
    r
}, [0x8f, 0xe8, 0x68, 0xcc, 0xcb, 0x02]);

// EVEX.

test!(evex_zmm, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x6c, 0x48, 0x58, 0xcb]);

test!(evex_forced_xmm, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.allowed_encodings = EncodingSet::only(Encoding::Evex);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2).push_reg(reg::XMM3);
    r
}, [0x62, 0xf1, 0x6c, 0x08, 0x58, 0xcb]);

test!(evex_masked, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1)
        .push_reg(reg::K1)
        .push_reg(reg::ZMM2)
        .push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x6c, 0x49, 0x58, 0xcb]);

test!(evex_zeroing_mask, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.zeroing = true;
    r.push_reg(reg::ZMM1)
        .push_reg(reg::K1)
        .push_reg(reg::ZMM2)
        .push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x6c, 0xc9, 0x58, 0xcb]);

test!(evex_broadcast, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.broadcast = Broadcast::B1to16;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_mem(Mem::base(reg::RAX));
    r
}, [0x62, 0xf1, 0x6c, 0x58, 0x58, 0x08]);

test!(evex_rounding, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.rounding = Rounding::Zero;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x6c, 0x78, 0x58, 0xcb]);

test!(evex_rounding_nearest, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.rounding = Rounding::Nearest;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x6c, 0x18, 0x58, 0xcb]);

test!(evex_sae, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.sae = true;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x6c, 0x58, 0x58, 0xcb]);

test!(evex_compressed_disp8, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1)
        .push_reg(reg::ZMM2)
        .push_mem(Mem::base(reg::RAX).disp(0x40));
    r
}, [0x62, 0xf1, 0x6c, 0x48, 0x58, 0x48, 0x01]);

test!(evex_unscalable_disp32, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1)
        .push_reg(reg::ZMM2)
        .push_mem(Mem::base(reg::RAX).disp(0x44));
    r
}, [0x62, 0xf1, 0x6c, 0x48, 0x58, 0x88, 0x44, 0x00, 0x00, 0x00]);

test!(evex_broadcast_disp8, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.broadcast = Broadcast::B1to16;
    r.push_reg(reg::ZMM1)
        .push_reg(reg::ZMM2)
        .push_mem(Mem::base(reg::RAX).disp(0x40));
    r
}, [0x62, 0xf1, 0x6c, 0x58, 0x58, 0x48, 0x10]);

test!(evex_high_rm_reg, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1)
        .push_reg(reg::ZMM2)
        .push_reg(encoder_x86::Reg::zmm(24));
    r
}, [0x62, 0x91, 0x6c, 0x48, 0x58, 0xc8]);

test!(evex_high_vvvv_reg, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1)
        .push_reg(encoder_x86::Reg::zmm(18))
        .push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x6c, 0x40, 0x58, 0xcb]);

test!(evex_vpaddd_broadcast, {
    let mut r = req(Long64, Mnemonic::Vpaddd);
    r.evex.broadcast = Broadcast::B1to16;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_mem(Mem::base(reg::RAX));
    r
}, [0x62, 0xf1, 0x6d, 0x58, 0xfe, 0x08]);

// MVEX.

fn mvex_req(mnemonic: Mnemonic) -> EncodeRequest {
    let mut r = req(Long64, mnemonic);
    r.allowed_encodings = EncodingSet::only(Encoding::Mvex);
    r
}

test!(mvex_zmm, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x68, 0x08, 0x58, 0xcb]);

test!(mvex_masked, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.push_reg(reg::ZMM1)
        .push_reg(reg::K1)
        .push_reg(reg::ZMM2)
        .push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x68, 0x09, 0x58, 0xcb]);

test!(mvex_swizzle, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.mvex.swizzle = Swizzle::Cdab;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x68, 0x18, 0x58, 0xcb]);

test!(mvex_rounding, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.mvex.rounding = Rounding::Down;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x68, 0x98, 0x58, 0xcb]);

test!(mvex_sae, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.mvex.sae = true;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
    r
}, [0x62, 0xf1, 0x68, 0xc8, 0x58, 0xcb]);

test!(mvex_upconvert, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.mvex.conversion = Conversion::Uint8;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_mem(Mem::base(reg::RAX));
    r
}, [0x62, 0xf1, 0x68, 0x48, 0x58, 0x08]);

test!(mvex_upconvert_disp8, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.mvex.conversion = Conversion::Uint8;
    r.push_reg(reg::ZMM1)
        .push_reg(reg::ZMM2)
        .push_mem(Mem::base(reg::RAX).disp(0x20));
    r
}, [0x62, 0xf1, 0x68, 0x48, 0x58, 0x48, 0x02]);

test!(mvex_broadcast, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.mvex.broadcast = Broadcast::B1to16;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_mem(Mem::base(reg::RAX));
    r
}, [0x62, 0xf1, 0x68, 0x18, 0x58, 0x08]);

test!(mvex_eviction_hint, {
    let mut r = mvex_req(Mnemonic::Vaddps);
    r.mvex.eviction_hint = true;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_mem(Mem::base(reg::RAX));
    r
}, [0x62, 0xf1, 0x68, 0x88, 0x58, 0x08]);

// Failure modes.

err!(unknown_mnemonic, req(Long64, Mnemonic::Invalid), UnknownMnemonic);

err!(no_applicable_encoding, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.allowed_encodings = EncodingSet::only(Encoding::Legacy);
    r.push_reg(reg::XMM1).push_reg(reg::XMM2).push_reg(reg::XMM3);
    r
}, NoApplicableEncoding);

err!(operand_width_conflict, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::EAX).push_reg(reg::RBX);
    r
}, OperandMismatch);

err!(gpr64_outside_long_mode, {
    let mut r = req(Legacy32, Mnemonic::Add);
    r.push_reg(reg::RAX).push_imm(1);
    r
}, InvalidOperandForMode);

err!(byte_immediate_overflow, {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::BL).push_imm(0x1ff);
    r
}, ImmediateOverflow);

err!(forced_short_branch_overflow, {
    let mut r = req(Long64, Mnemonic::Jmp);
    r.branch_type = BranchType::Short;
    r.push_simm(0x1000);
    r
}, DisplacementOverflow);

err!(displacement_overflow, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX)
        .push_mem(Mem::base(reg::RAX).disp(0x1_0000_0000));
    r
}, DisplacementOverflow);

err!(conflicting_segment_overrides, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.prefixes.set(Prefixes::SEGMENT_FS | Prefixes::SEGMENT_GS);
    r.push_reg(reg::EAX).push_mem(Mem::base(reg::RBX));
    r
}, IllegalPrefix);

err!(lock_needs_memory, {
    let mut r = req(Long64, Mnemonic::Add);
    r.prefixes.set(Prefixes::LOCK);
    r.push_reg(reg::EAX).push_reg(reg::EBX);
    r
}, IllegalPrefix);

err!(rep_on_non_string, {
    let mut r = req(Long64, Mnemonic::Add);
    r.prefixes.set(Prefixes::REP);
    r.push_mem(Mem::base(reg::RBX)).push_reg(reg::EAX);
    r
}, IllegalPrefix);

err!(rounding_needs_512, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.rounding = Rounding::Up;
    r.push_reg(reg::YMM1).push_reg(reg::YMM2).push_reg(reg::YMM3);
    r
}, UnsupportedFeature);

err!(broadcast_factor_mismatch, {
    let mut r = req(Long64, Mnemonic::Vaddps);
    r.evex.broadcast = Broadcast::B1to2;
    r.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_mem(Mem::base(reg::RAX));
    r
}, UnsupportedFeature);

err!(high_byte_with_rex, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::AH).push_reg(reg::R8B);
    r
}, InvalidOperandForMode);

err!(rip_with_index, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX)
        .push_mem(Mem::base(reg::RIP).index(reg::RAX, 1));
    r
}, InvalidOperandForMode);

err!(esp_as_index, {
    let mut r = req(Long64, Mnemonic::Mov);
    r.push_reg(reg::EAX)
        .push_mem(Mem::base(reg::RAX).index(reg::RSP, 2));
    r
}, OperandMismatch);

err!(far64_branch, {
    let mut r = req(Legacy32, Mnemonic::Jmp);
    r.branch_type = BranchType::Far64;
    r.push_ptr(0x10, 0x1000);
    r
}, InvalidOperandForMode);

#[test]
fn buffer_too_small_writes_nothing() {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::ECX).push_imm(1);
    let mut buf = [0xaa_u8; 2];
    assert_eq!(encode(&r, &mut buf), Err(Error::BufferTooSmall));
    assert_eq!(buf, [0xaa, 0xaa]);
}

#[test]
fn failed_encode_writes_nothing() {
    let mut r = req(Long64, Mnemonic::Add);
    r.push_reg(reg::EAX).push_reg(reg::RBX);
    let mut buf = [0xaa_u8; 16];
    assert!(encode(&r, &mut buf).is_err());
    assert!(buf.iter().all(|b| *b == 0xaa));
}
